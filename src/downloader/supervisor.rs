//! Job supervisor - owns at most one running download job.
//!
//! Completion is detected by polling the worker thread's liveness rather
//! than by joining it, so a consumer running a cooperative event loop
//! never blocks. A finished job is reported exactly once by [`JobSupervisor::poll`],
//! after which the supervisor is idle again.
//!
//! ```text
//! IDLE --start--> RUNNING --worker exits--> FINISHED --poll--> IDLE
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::errors::DownloadError;
use super::events::{event_channel, EventReceiver};
use super::job::DownloadJob;
use super::models::{JobOutcome, JobRequest, JobState, LogEvent};
use super::profiles::ProfileRegistry;
use super::spinner::LoadingIndicator;
use super::traits::RetrievalEngine;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_SPINNER_INTERVAL: Duration = Duration::from_millis(125);

/// Timer periods for the consumer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Liveness check period
    pub poll: Duration,
    /// Spinner frame period
    pub spinner: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            poll: DEFAULT_POLL_INTERVAL,
            spinner: DEFAULT_SPINNER_INTERVAL,
        }
    }
}

/// Result of one non-blocking liveness tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// No job to watch
    Idle,
    Running,
    /// The worker has exited. Returned once per job.
    Finished(JobOutcome),
}

/// What the consumer loop hands to its observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobUpdate {
    Log(LogEvent),
    Spinner(&'static str),
    Finished(JobOutcome),
}

struct ActiveJob {
    request: JobRequest,
    handle: JoinHandle<JobOutcome>,
    cancel: CancellationToken,
}

impl ActiveJob {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    // Only called once the thread has exited, so join returns at once
    fn reap(self) -> JobOutcome {
        self.handle
            .join()
            .unwrap_or_else(|_| JobOutcome::Failed("worker thread panicked".to_string()))
    }
}

struct Slot {
    active: Option<ActiveJob>,
    last_state: JobState,
}

pub struct JobSupervisor {
    engine: Arc<dyn RetrievalEngine>,
    slot: Mutex<Slot>,
}

impl JobSupervisor {
    pub fn new(engine: Arc<dyn RetrievalEngine>) -> Self {
        Self {
            engine,
            slot: Mutex::new(Slot {
                active: None,
                last_state: JobState::NotStarted,
            }),
        }
    }

    // A panic while holding the lock must not wedge the liveness poll
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a job and return the receiving half of its event channel.
    ///
    /// Fails with `AlreadyRunning` while the current worker is alive; no
    /// second worker is spawned in that case.
    pub fn start(&self, request: JobRequest) -> Result<EventReceiver, DownloadError> {
        let mut slot = self.slot();

        if slot.active.as_ref().is_some_and(ActiveJob::is_alive) {
            tracing::warn!(target_identifier = %request.target_identifier, "rejecting start, a job is already running");
            return Err(DownloadError::AlreadyRunning);
        }

        if let Some(stale) = slot.active.take() {
            // Finished but never polled; nobody is waiting for this result
            let outcome = stale.reap();
            tracing::debug!(?outcome, "discarding unpolled job result");
        }

        let profile = ProfileRegistry::resolve(&request.profile_name);
        let (tx, rx) = event_channel();
        let cancel = CancellationToken::new();
        let job = DownloadJob::new(request.clone(), profile, self.engine.clone(), tx, cancel.clone());
        let handle = job.spawn()?;

        tracing::info!(engine = self.engine.name(), profile = %profile.name, "job spawned");
        slot.active = Some(ActiveJob { request, handle, cancel });
        slot.last_state = JobState::Running;
        Ok(rx)
    }

    /// Non-blocking liveness check of the current worker
    pub fn is_running(&self) -> bool {
        self.slot().active.as_ref().is_some_and(ActiveJob::is_alive)
    }

    /// Lifecycle of the most recent job handle
    pub fn job_state(&self) -> JobState {
        let slot = self.slot();
        match &slot.active {
            Some(active) if active.is_alive() => JobState::Running,
            Some(_) => JobState::Finished,
            None => slot.last_state,
        }
    }

    pub fn current_request(&self) -> Option<JobRequest> {
        self.slot().active.as_ref().map(|a| a.request.clone())
    }

    /// Best-effort cancellation of the running job.
    ///
    /// The engine is asked to stop; whatever it already wrote stays on
    /// disk. Returns false when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        match self.slot().active.as_ref() {
            Some(active) if active.is_alive() => {
                active.cancel.cancel();
                tracing::info!(target_identifier = %active.request.target_identifier, "cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// One liveness tick
    pub fn poll(&self) -> PollStatus {
        let mut slot = self.slot();

        match slot.active.as_ref() {
            None => return PollStatus::Idle,
            Some(active) if active.is_alive() => return PollStatus::Running,
            Some(_) => {}
        }

        let Some(finished) = slot.active.take() else {
            return PollStatus::Idle;
        };
        slot.last_state = JobState::Finished;
        PollStatus::Finished(finished.reap())
    }

    /// Cooperative consumer loop.
    ///
    /// Forwards log events as they arrive, advances the spinner every
    /// `timing.spinner` and checks liveness every `timing.poll`. On the
    /// first tick that finds the worker gone it drains what is left in the
    /// channel, reports `Finished` once and returns; the spinner stops with
    /// it. Returns `None` if there was no job to watch.
    pub async fn poll_until_complete<F>(
        &self,
        events: &mut EventReceiver,
        timing: PollTiming,
        mut observer: F,
    ) -> Option<JobOutcome>
    where
        F: FnMut(JobUpdate),
    {
        let mut poll_tick = tokio::time::interval(timing.poll);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut spinner_tick = tokio::time::interval(timing.spinner);
        spinner_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut frame: Option<&'static str> = None;
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;

                _ = poll_tick.tick() => {
                    let outcome = match self.poll() {
                        PollStatus::Running => continue,
                        PollStatus::Idle => None,
                        PollStatus::Finished(outcome) => Some(outcome),
                    };
                    for event in events.drain() {
                        observer(JobUpdate::Log(event));
                    }
                    if let Some(outcome) = &outcome {
                        observer(JobUpdate::Finished(outcome.clone()));
                    }
                    return outcome;
                }
                _ = spinner_tick.tick() => {
                    let next = match frame {
                        Some(current) => LoadingIndicator::next(current),
                        None => LoadingIndicator::initial_state(),
                    };
                    frame = Some(next);
                    observer(JobUpdate::Spinner(next));
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => observer(JobUpdate::Log(event)),
                    None => events_open = false,
                },
            }
        }
    }
}
