//! Starwatch engine: HTTP access, connectivity tracking and session driving.
mod api;
mod client;
mod connectivity;
mod retry;
mod session;
mod types;

pub use api::{HttpJobApi, JobApi};
pub use client::{ApiClient, ApiSettings};
pub use connectivity::{ConnectivityMonitor, ConnectivityWatch};
pub use retry::{with_retry, RetryPolicy};
pub use session::{watch_job, SessionEvent, SessionHandle, WatchSettings};
pub use types::{ApiError, ClassifyRequest, HealthStatus};
