use std::fmt;

use crate::{JobId, RequestSeq};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchStatus { job_id: JobId, seq: RequestSeq },
    FetchResult { job_id: JobId },
    /// Arm the repeating poll timer from now, replacing any existing one.
    StartTimer,
    StopTimer,
    Notify(Notice),
}

/// User-facing notification, emitted once per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ConnectionLost,
    ConnectionRestored,
    JobFailed(String),
    PollingStalled(String),
    ResultUnavailable(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ConnectionLost => {
                write!(f, "Connection lost. Will retry when connection is restored.")
            }
            Notice::ConnectionRestored => write!(f, "Connection restored"),
            Notice::JobFailed(message) => write!(f, "Classification failed: {message}"),
            Notice::PollingStalled(message) => write!(f, "Could not fetch job status: {message}"),
            Notice::ResultUnavailable(message) => write!(f, "Could not fetch results: {message}"),
        }
    }
}
