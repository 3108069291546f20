use crate::{JobStatus, RequestSeq, ResultPayload};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Consumer started observing the job.
    Started,
    /// Repeating poll timer fired.
    Tick,
    /// A status request finished, after its own retries.
    StatusFetched {
        seq: RequestSeq,
        result: Result<JobStatus, String>,
    },
    /// The result request finished, after its own retries.
    ResultFetched(Result<ResultPayload, String>),
    /// Host connectivity changed.
    ConnectivityChanged { online: bool },
    /// User asked to try again after a failure.
    RetryRequested,
    /// Consumer stopped observing; nothing is applied afterwards.
    Cancelled,
}
