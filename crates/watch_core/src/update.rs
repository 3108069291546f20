use crate::{
    Effect, JobState, JobStatus, Msg, Notice, PollerPhase, RequestSeq, ResultPayload, ResultState,
    SessionState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SessionState, msg: Msg) -> (SessionState, Vec<Effect>) {
    if state.is_cancelled() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Started => {
            if state.poller.phase == PollerPhase::Idle {
                begin_polling(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::Tick => {
            if state.poller.phase == PollerPhase::Polling && state.poller.in_flight.is_none() {
                vec![fetch_status(&mut state)]
            } else {
                Vec::new()
            }
        }
        Msg::StatusFetched { seq, result } => apply_status(&mut state, seq, result),
        Msg::ResultFetched(result) => apply_result(&mut state, result),
        Msg::ConnectivityChanged { online } => apply_connectivity(&mut state, online),
        Msg::RetryRequested => retry(&mut state),
        Msg::Cancelled => {
            state.cancelled = true;
            state.poller.in_flight = None;
            state.mark_dirty();
            Vec::new()
        }
    };

    (state, effects)
}

fn fetch_status(state: &mut SessionState) -> Effect {
    let seq = state.poller.issue_request();
    Effect::FetchStatus {
        job_id: state.job_id().clone(),
        seq,
    }
}

fn fetch_result(state: &mut SessionState) -> Effect {
    state.result = ResultState::Fetching;
    state.result_requests += 1;
    Effect::FetchResult {
        job_id: state.job_id().clone(),
    }
}

/// Polls immediately and arms the timer, or parks the session while offline.
fn begin_polling(state: &mut SessionState) -> Vec<Effect> {
    state.mark_dirty();
    if !state.online {
        state.poller.phase = PollerPhase::Paused;
        return Vec::new();
    }
    state.poller.phase = PollerPhase::Polling;
    vec![fetch_status(state), Effect::StartTimer]
}

fn apply_status(
    state: &mut SessionState,
    seq: RequestSeq,
    result: Result<JobStatus, String>,
) -> Vec<Effect> {
    // Only the most recently issued request may land.
    if state.poller.in_flight != Some(seq) {
        return Vec::new();
    }
    state.poller.in_flight = None;

    let paused = match state.poller.phase {
        PollerPhase::Polling => false,
        PollerPhase::Paused => true,
        _ => return Vec::new(),
    };

    match result {
        Ok(status) => {
            state.mark_dirty();
            let job_state = status.status;
            let failure = (job_state == JobState::Failed).then(|| status.failure_message());
            state.poller.last_status = Some(status);
            match job_state {
                JobState::Pending | JobState::Processing => Vec::new(),
                JobState::Completed => {
                    state.poller.phase = PollerPhase::Completed;
                    // While offline the result fetch waits for reconnect.
                    if paused {
                        return Vec::new();
                    }
                    vec![Effect::StopTimer, fetch_result(state)]
                }
                JobState::Failed => {
                    state.poller.phase = PollerPhase::Failed;
                    let message = failure.unwrap_or_default();
                    let mut effects = Vec::with_capacity(2);
                    if !paused {
                        effects.push(Effect::StopTimer);
                    }
                    effects.push(Effect::Notify(Notice::JobFailed(message)));
                    effects
                }
            }
        }
        // Offline is not an error; the resume fetch supersedes this one.
        Err(_) if paused => Vec::new(),
        Err(message) => {
            state.mark_dirty();
            state.poller.phase = PollerPhase::Stalled;
            state.poller.stall_message = Some(message.clone());
            vec![Effect::StopTimer, Effect::Notify(Notice::PollingStalled(message))]
        }
    }
}

fn apply_result(state: &mut SessionState, result: Result<ResultPayload, String>) -> Vec<Effect> {
    if !matches!(state.result, ResultState::Fetching) {
        return Vec::new();
    }
    state.mark_dirty();
    match result {
        Ok(payload) => {
            state.result = ResultState::Ready(payload);
            Vec::new()
        }
        // Lost connection mid-fetch; fetched again on reconnect.
        Err(_) if !state.online => {
            state.result = ResultState::NotRequested;
            Vec::new()
        }
        Err(message) => {
            state.result = ResultState::Failed(message.clone());
            vec![Effect::Notify(Notice::ResultUnavailable(message))]
        }
    }
}

fn apply_connectivity(state: &mut SessionState, online: bool) -> Vec<Effect> {
    if state.online == online {
        return Vec::new();
    }
    state.online = online;
    state.mark_dirty();

    if !online {
        let mut effects = vec![Effect::Notify(Notice::ConnectionLost)];
        if state.poller.phase == PollerPhase::Polling {
            state.poller.phase = PollerPhase::Paused;
            effects.push(Effect::StopTimer);
        }
        return effects;
    }

    let mut effects = vec![Effect::Notify(Notice::ConnectionRestored)];
    if state.poller.phase == PollerPhase::Completed
        && matches!(state.result, ResultState::NotRequested)
    {
        effects.push(fetch_result(state));
        return effects;
    }
    let resumable = state
        .poller
        .last_status
        .as_ref()
        .is_none_or(|status| !status.is_terminal());
    if state.poller.phase == PollerPhase::Paused && resumable {
        state.poller.phase = PollerPhase::Polling;
        effects.push(fetch_status(state));
        effects.push(Effect::StartTimer);
    }
    effects
}

fn retry(state: &mut SessionState) -> Vec<Effect> {
    match state.poller.phase {
        PollerPhase::Failed | PollerPhase::Stalled => {
            state.poller.last_status = None;
            state.poller.stall_message = None;
            state.result = ResultState::NotRequested;
            begin_polling(state)
        }
        PollerPhase::Completed if matches!(state.result, ResultState::Failed(_)) => {
            state.mark_dirty();
            vec![fetch_result(state)]
        }
        _ => Vec::new(),
    }
}
