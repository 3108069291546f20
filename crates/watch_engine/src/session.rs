use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use watch_core::{
    update, Effect, JobId, JobStatus, Msg, Notice, RequestSeq, ResultPayload, SessionState,
};
use watch_logging::{watch_debug, watch_info, watch_warn};

use crate::connectivity::{ConnectivityMonitor, ConnectivityWatch};
use crate::retry::RetryPolicy;
use crate::{ApiError, JobApi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub status_retry: RetryPolicy,
    pub result_retry: RetryPolicy,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            status_retry: RetryPolicy::status_default(),
            result_retry: RetryPolicy::result_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session state changed; project it with [`SessionState::view`].
    Updated(SessionState),
    Notice(Notice),
}

enum SessionCommand {
    Retry,
}

/// Consumer side of a running watch session.
///
/// Dropping the handle cancels the session.
pub struct SessionHandle {
    job_id: JobId,
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Manual retry after a failure; ignored in any other state.
    pub fn retry(&self) {
        let _ = self.commands.send(SessionCommand::Retry);
    }

    /// Stops observation: the timer, any in-flight request and its retry delay
    /// are cancelled, and no further events are delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next event, or `None` once the session is cancelled or has finished.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// Waits for the session task to end.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts observing `job_id` on the current tokio runtime.
///
/// All transitions of the session happen on one task, so the state needs no
/// locking; the session subscribes to `connectivity` for its lifetime.
pub fn watch_job(
    api: Arc<dyn JobApi>,
    connectivity: &ConnectivityMonitor,
    job_id: JobId,
    settings: WatchSettings,
) -> SessionHandle {
    let cancel = CancellationToken::new();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let watch = connectivity.subscribe();
    let state = SessionState::new(job_id.clone(), watch.is_online());
    let driver = SessionDriver {
        api,
        settings,
        connectivity: watch,
        cancel: cancel.clone(),
        events: event_tx,
        timer: None,
        status_request: None,
        in_flight: FuturesUnordered::new(),
    };
    let task = tokio::spawn(driver.run(state, cmd_rx));

    SessionHandle {
        job_id,
        cancel,
        commands: cmd_tx,
        events: event_rx,
        task: Some(task),
    }
}

enum Completion {
    Status {
        seq: RequestSeq,
        result: Result<JobStatus, ApiError>,
    },
    Result(Result<ResultPayload, ApiError>),
}

struct SessionDriver {
    api: Arc<dyn JobApi>,
    settings: WatchSettings,
    connectivity: ConnectivityWatch,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
    timer: Option<Interval>,
    status_request: Option<CancellationToken>,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl SessionDriver {
    async fn run(
        mut self,
        state: SessionState,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) {
        let job_id = state.job_id().clone();
        watch_info!("Watching job {job_id}");
        let mut state = self.dispatch(state, Msg::Started);

        while !state.is_finished() {
            let msg = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Some(Msg::Cancelled),
                command = commands.recv() => match command {
                    Some(SessionCommand::Retry) => Some(Msg::RetryRequested),
                    None => {
                        self.cancel.cancel();
                        Some(Msg::Cancelled)
                    }
                },
                online = self.connectivity.changed() => Some(Msg::ConnectivityChanged { online }),
                Some(done) = self.in_flight.next(), if !self.in_flight.is_empty() => completion_msg(done),
                _ = next_tick(&mut self.timer) => Some(Msg::Tick),
            };
            if let Some(msg) = msg {
                state = self.dispatch(state, msg);
            }
        }

        if state.is_cancelled() {
            watch_info!("Stopped watching job {job_id}");
        } else {
            watch_info!("Finished watching job {job_id}");
        }
    }

    fn dispatch(&mut self, state: SessionState, msg: Msg) -> SessionState {
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            self.emit(SessionEvent::Updated(state.clone()));
        }
        for effect in effects {
            self.run_effect(effect);
        }
        state
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchStatus { job_id, seq } => {
                // Last request issued wins; the older one stops retrying.
                if let Some(previous) = self.status_request.take() {
                    previous.cancel();
                }
                let token = self.cancel.child_token();
                self.status_request = Some(token.clone());
                let api = Arc::clone(&self.api);
                watch_debug!("Fetching status of job {job_id} (request {seq})");
                self.in_flight.push(Box::pin(async move {
                    let result = api.job_status(&job_id, &token).await;
                    Completion::Status { seq, result }
                }));
            }
            Effect::FetchResult { job_id } => {
                let token = self.cancel.child_token();
                let api = Arc::clone(&self.api);
                watch_info!("Job {job_id} completed; fetching results");
                self.in_flight.push(Box::pin(async move {
                    Completion::Result(api.job_result(&job_id, &token).await)
                }));
            }
            Effect::StartTimer => {
                let period = self.settings.poll_interval;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.timer = Some(interval);
            }
            Effect::StopTimer => {
                self.timer = None;
            }
            Effect::Notify(notice) => {
                match &notice {
                    Notice::JobFailed(_)
                    | Notice::PollingStalled(_)
                    | Notice::ResultUnavailable(_) => watch_warn!("{notice}"),
                    Notice::ConnectionLost | Notice::ConnectionRestored => {
                        watch_debug!("{notice}")
                    }
                }
                self.emit(SessionEvent::Notice(notice));
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.events.send(event);
    }
}

/// Cancelled requests were superseded or belong to a stopped session.
fn completion_msg(done: Completion) -> Option<Msg> {
    match done {
        Completion::Status {
            result: Err(ApiError::Cancelled),
            ..
        }
        | Completion::Result(Err(ApiError::Cancelled)) => None,
        Completion::Status { seq, result } => Some(Msg::StatusFetched {
            seq,
            result: result.map_err(|err| err.to_string()),
        }),
        Completion::Result(result) => Some(Msg::ResultFetched(
            result.map_err(|err| err.to_string()),
        )),
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
