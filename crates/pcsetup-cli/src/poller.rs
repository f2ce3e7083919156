//! Status poller: one repeating fetch task for one request.
//!
//! Starting a poll always cancels the previous one, so there is never more
//! than one timer. The task reports through an mpsc channel and stops on its
//! own when the session ends or the receiver goes away.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pcsetup_core::{Result, StatusReport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::status_view::StatusView;

/// Where status snapshots come from.
pub trait StatusSource: Send + Sync + 'static {
    fn fetch_status(&self, request_id: &str) -> impl Future<Output = Result<StatusReport>> + Send;
}

/// Message from the poll task.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Updated(StatusView),
    /// One fetch failed; the next tick tries again.
    Failed { request_id: String, message: String },
    /// The session ended; polling has stopped.
    SessionEnded { request_id: String, message: String },
}

struct ActivePoll {
    request_id: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owner of the single poll task.
pub struct StatusPoller {
    interval: Duration,
    active: Option<ActivePoll>,
}

impl StatusPoller {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
        }
    }

    /// Poll `request_id`: once immediately, then every interval.
    ///
    /// Any poll already running is stopped first.
    pub fn start_polling<S: StatusSource>(
        &mut self,
        request_id: &str,
        source: Arc<S>,
        events: mpsc::Sender<PollEvent>,
    ) {
        self.stop_polling();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = spawn_poll_task(
            request_id.to_string(),
            source,
            events,
            self.interval,
            shutdown_rx,
        );
        info!(%request_id, interval_secs = self.interval.as_secs(), "polling started");
        self.active = Some(ActivePoll {
            request_id: request_id.to_string(),
            shutdown,
            handle,
        });
    }

    /// Cancel the timer and clear the target. No-op when idle.
    pub fn stop_polling(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.shutdown.send(true);
            active.handle.abort();
            info!(request_id = %active.request_id, "polling stopped");
        }
    }

    /// The request currently targeted, even if its task already ended.
    pub fn active_target(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.request_id.as_str())
    }

    /// Whether a poll task is still running.
    pub fn is_polling(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.handle.is_finished())
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

fn spawn_poll_task<S: StatusSource>(
    request_id: String,
    source: Arc<S>,
    events: mpsc::Sender<PollEvent>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            tokio::select! {
                _ = timer.tick() => {}
                _ = shutdown.changed() => {
                    debug!(%request_id, "poll task shutting down");
                    return;
                }
            }

            let event = match source.fetch_status(&request_id).await {
                Ok(report) => PollEvent::Updated(StatusView::from_report(&request_id, &report)),
                Err(e) if e.is_auth() => {
                    warn!(%request_id, error = %e, "session ended while polling");
                    let _ = events
                        .send(PollEvent::SessionEnded {
                            request_id: request_id.clone(),
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
                Err(e) => {
                    warn!(%request_id, error = %e, "status fetch failed");
                    PollEvent::Failed {
                        request_id: request_id.clone(),
                        message: e.to_string(),
                    }
                }
            };

            if events.send(event).await.is_err() {
                debug!(%request_id, "status receiver dropped, stopping poll");
                return;
            }
        }
    })
}
