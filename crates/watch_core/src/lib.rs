//! Starwatch core: pure job-session state machine and view projection.
mod effect;
mod job;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Notice};
pub use job::{ClassifiedRepo, JobId, JobState, JobStatus, ResultPayload, ResultStats};
pub use msg::Msg;
pub use state::{PollerPhase, PollerState, RequestSeq, ResultState, SessionState};
pub use update::update;
pub use view_model::{project, StepEstimate, ViewState, STEP_COUNT, STEP_DURATION};
