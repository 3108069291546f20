use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{PollerPhase, PollerState, ResultPayload, ResultState};

/// Number of coarse steps shown while a job is processing.
pub const STEP_COUNT: u8 = 3;
/// Elapsed time attributed to each step by the estimate.
pub const STEP_DURATION: Duration = Duration::from_secs(30);

const STEP_LABELS: [&str; STEP_COUNT as usize] = [
    "Fetching repositories",
    "Analyzing data",
    "Generating report",
];

const STALLED_FALLBACK: &str = "job status unavailable";

/// Coarse progress heuristic derived from elapsed time only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEstimate {
    /// 1-based step index.
    pub current: u8,
    pub total: u8,
}

impl StepEstimate {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let step = elapsed.as_secs() / STEP_DURATION.as_secs() + 1;
        Self {
            current: step.min(u64::from(STEP_COUNT)) as u8,
            total: STEP_COUNT,
        }
    }

    pub fn label(&self) -> &'static str {
        let index = usize::from(self.current.clamp(1, STEP_COUNT)) - 1;
        STEP_LABELS[index]
    }

    pub fn percent(&self) -> u8 {
        (u32::from(self.current) * 100 / u32::from(self.total.max(1))) as u8
    }
}

/// Single user-facing state of a watch session.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Processing {
        elapsed: Duration,
        total_items: Option<u32>,
        step: StepEstimate,
    },
    OfflineWaiting,
    Failed(String),
    Completed(ResultPayload),
}

impl ViewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewState::Failed(_) | ViewState::Completed(_))
    }
}

/// Combines poller state, result state and connectivity into one view.
///
/// Terminal outcomes take precedence over connectivity, so a retrieved result
/// or a reported failure never reverts to waiting while offline. A completed
/// job whose result is still outstanding waits like any other offline session.
pub fn project(
    poller: &PollerState,
    result: &ResultState,
    online: bool,
    now: DateTime<Utc>,
) -> ViewState {
    match poller.phase() {
        PollerPhase::Failed => ViewState::Failed(
            poller
                .last_status()
                .map(|status| status.failure_message())
                .unwrap_or_else(|| crate::job::DEFAULT_FAILURE_MESSAGE.to_string()),
        ),
        PollerPhase::Stalled => ViewState::Failed(
            poller
                .stall_message()
                .unwrap_or(STALLED_FALLBACK)
                .to_string(),
        ),
        PollerPhase::Completed => match result {
            ResultState::Ready(payload) => ViewState::Completed(payload.clone()),
            ResultState::Failed(message) => ViewState::Failed(message.clone()),
            ResultState::NotRequested | ResultState::Fetching if !online => {
                ViewState::OfflineWaiting
            }
            ResultState::NotRequested | ResultState::Fetching => ViewState::Loading,
        },
        _ if !online => ViewState::OfflineWaiting,
        PollerPhase::Idle | PollerPhase::Polling | PollerPhase::Paused => {
            match poller.last_status() {
                Some(status) if !status.is_terminal() => {
                    let elapsed = (now - status.created_at).to_std().unwrap_or(Duration::ZERO);
                    ViewState::Processing {
                        elapsed,
                        total_items: status.total_repos,
                        step: StepEstimate::from_elapsed(elapsed),
                    }
                }
                _ => ViewState::Loading,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_estimate_advances_every_thirty_seconds_and_saturates() {
        let at = |secs| StepEstimate::from_elapsed(Duration::from_secs(secs)).current;
        assert_eq!(at(0), 1);
        assert_eq!(at(29), 1);
        assert_eq!(at(30), 2);
        assert_eq!(at(60), 3);
        assert_eq!(at(3600), 3);
    }

    fn completed_poller() -> PollerState {
        PollerState {
            phase: PollerPhase::Completed,
            ..PollerState::default()
        }
    }

    #[test]
    fn outstanding_result_waits_while_offline() {
        let now = Utc::now();
        let poller = completed_poller();
        for result in [ResultState::NotRequested, ResultState::Fetching] {
            assert_eq!(project(&poller, &result, false, now), ViewState::OfflineWaiting);
            assert_eq!(project(&poller, &result, true, now), ViewState::Loading);
        }
    }

    #[test]
    fn retrieved_result_outlasts_connection_loss() {
        let failed = ResultState::Failed("http status 500: boom".to_string());
        assert_eq!(
            project(&completed_poller(), &failed, false, Utc::now()),
            ViewState::Failed("http status 500: boom".to_string())
        );
    }

    #[test]
    fn step_estimate_labels_and_percent() {
        let step = StepEstimate::from_elapsed(Duration::from_secs(45));
        assert_eq!(step.label(), "Analyzing data");
        assert_eq!(step.percent(), 66);
    }
}
