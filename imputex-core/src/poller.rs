//! Cancellable background task that fetches one job status snapshot per
//! tick and hands it back over a channel.
//!
//! Requests are single-flight: a tick awaits its response before the next
//! tick is considered, and ticks missed while waiting are skipped. Transport
//! failures are logged and dropped; the next tick tries again.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ImputationApi;
use crate::types::{JobStatusResponse, ServerJobStatus};

/// Shortest tick period; a zero interval is raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A snapshot delivered by the poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollEvent {
    /// Identifies which poller produced the event.
    pub generation: u64,
    /// Strictly increasing per poller, starting at 1.
    pub sequence: u64,
    pub status: JobStatusResponse,
}

/// Timing for a poller.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

/// Owns the polling task for one job.
///
/// Stopping is idempotent and dropping the poller stops it.
pub struct JobPoller {
    job_id: String,
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
    stopped: bool,
}

impl JobPoller {
    /// Start polling `job_id`; snapshots are sent on `events`.
    pub fn spawn(
        api: Arc<dyn ImputationApi>,
        job_id: impl Into<String>,
        generation: u64,
        mut settings: PollSettings,
        events: mpsc::Sender<PollEvent>,
    ) -> Self {
        settings.interval = settings.interval.max(MIN_POLL_INTERVAL);
        let job_id = job_id.into();
        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            api,
            job_id.clone(),
            generation,
            settings,
            token.clone(),
            events,
        ));
        info!(job_id = %job_id, generation, interval_ms = settings.interval.as_millis() as u64, "Polling started");
        Self {
            job_id,
            generation,
            token,
            handle,
            stopped: false,
        }
    }

    /// Cancel the polling task. Returns `true` only for the call that actually stopped it.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        self.token.cancel();
        info!(job_id = %self.job_id, generation = self.generation, "Polling stopped");
        true
    }

    /// Whether the task is still scheduled to tick.
    pub fn is_active(&self) -> bool {
        !self.stopped && !self.handle.is_finished()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn is_terminal(status: ServerJobStatus) -> bool {
    matches!(status, ServerJobStatus::Completed | ServerJobStatus::Failed)
}

async fn poll_loop(
    api: Arc<dyn ImputationApi>,
    job_id: String,
    generation: u64,
    settings: PollSettings,
    token: CancellationToken,
    events: mpsc::Sender<PollEvent>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = tokio::time::timeout(settings.request_timeout, api.get_status(&job_id)) => r,
        };

        let status = match result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(job_id = %job_id, error = %e, "Status poll failed; keeping last snapshot");
                continue;
            }
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    timeout_ms = settings.request_timeout.as_millis() as u64,
                    "Status poll timed out; keeping last snapshot"
                );
                continue;
            }
        };

        sequence += 1;
        let terminal = is_terminal(status.status);
        debug!(job_id = %job_id, sequence, status = %status.status, progress = status.progress, "Snapshot received");

        if events
            .send(PollEvent {
                generation,
                sequence,
                status,
            })
            .await
            .is_err()
        {
            debug!(job_id = %job_id, "Snapshot receiver dropped");
            break;
        }
        if terminal {
            debug!(job_id = %job_id, "Terminal status observed; poll loop exiting");
            break;
        }
    }
}
