use chrono::{DateTime, Utc};

use crate::view_model::{project, ViewState};
use crate::{JobId, JobStatus, ResultPayload};

/// Sequence number attached to each status request of a session.
pub type RequestSeq = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerPhase {
    /// Observation not started yet.
    #[default]
    Idle,
    /// Repeating timer armed.
    Polling,
    /// Timer suspended while offline.
    Paused,
    /// Status requests exhausted their retry budget; waits for a manual retry.
    Stalled,
    Completed,
    Failed,
}

impl PollerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollerPhase::Completed | PollerPhase::Failed)
    }
}

/// Poller half of a session: phase, cached snapshot and request bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollerState {
    pub(crate) phase: PollerPhase,
    pub(crate) last_status: Option<JobStatus>,
    pub(crate) stall_message: Option<String>,
    pub(crate) in_flight: Option<RequestSeq>,
    pub(crate) next_seq: RequestSeq,
    pub(crate) polls_issued: u32,
}

impl PollerState {
    pub fn phase(&self) -> PollerPhase {
        self.phase
    }

    pub fn last_status(&self) -> Option<&JobStatus> {
        self.last_status.as_ref()
    }

    pub fn stall_message(&self) -> Option<&str> {
        self.stall_message.as_deref()
    }

    pub fn in_flight(&self) -> Option<RequestSeq> {
        self.in_flight
    }

    pub fn polls_issued(&self) -> u32 {
        self.polls_issued
    }

    /// Allocates the next request; any earlier in-flight request is superseded.
    pub(crate) fn issue_request(&mut self) -> RequestSeq {
        self.next_seq += 1;
        self.in_flight = Some(self.next_seq);
        self.polls_issued += 1;
        self.next_seq
    }
}

/// Result-fetch half of a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultState {
    #[default]
    NotRequested,
    Fetching,
    Ready(ResultPayload),
    Failed(String),
}

/// State of one observation session for a single job.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    job_id: JobId,
    pub(crate) poller: PollerState,
    pub(crate) result: ResultState,
    pub(crate) result_requests: u32,
    pub(crate) online: bool,
    pub(crate) cancelled: bool,
    dirty: bool,
}

impl SessionState {
    pub fn new(job_id: JobId, online: bool) -> Self {
        Self {
            job_id,
            poller: PollerState::default(),
            result: ResultState::default(),
            result_requests: 0,
            online,
            cancelled: false,
            dirty: false,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn poller(&self) -> &PollerState {
        &self.poller
    }

    pub fn phase(&self) -> PollerPhase {
        self.poller.phase
    }

    pub fn result(&self) -> &ResultState {
        &self.result
    }

    /// Number of result fetches issued so far (manual retries included).
    pub fn result_requests(&self) -> u32 {
        self.result_requests
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True once nothing further can happen without the consumer going away.
    pub fn is_finished(&self) -> bool {
        self.cancelled
            || (self.poller.phase == PollerPhase::Completed
                && matches!(self.result, ResultState::Ready(_)))
    }

    pub fn view(&self, now: DateTime<Utc>) -> ViewState {
        project(&self.poller, &self.result, self.online, now)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
