//! Refresh scheduling.
//!
//! Every trigger (mount, manual refresh, app foregrounding, store updates and
//! the polling fallback) is fed through one command queue into a single task,
//! which starts at most one refresh cycle at a time and drops requests that
//! arrive while a cycle runs.

pub mod debounce;

pub use debounce::DebounceTracker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use upnext_common::{ContinueWatchingRow, ProgressEvent, Result};

use crate::config::EngineConfig;
use crate::continue_watching::{ContinueWatchingEngine, EngineState};

const COMMAND_CAPACITY: usize = 32;

/// Host application lifecycle, as reported by the embedding UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Quiet period before a burst of store updates triggers a refresh
    pub debounce: Duration,
    /// Interval of the polling fallback
    pub poll_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        (&EngineConfig::default()).into()
    }
}

impl From<&EngineConfig> for SchedulerSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            debounce: config.debounce(),
            poll_interval: config.poll_interval(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Refresh {
        foreground: bool,
        reply: Option<oneshot::Sender<bool>>,
    },
    AppState(AppLifecycle),
    ExternalUpdate,
    Shutdown,
}

/// Serializes refresh triggers for one engine.
pub struct RefreshScheduler {
    engine: Arc<ContinueWatchingEngine>,
    settings: SchedulerSettings,
    commands: mpsc::Receiver<Command>,
    updates: Option<broadcast::Receiver<ProgressEvent>>,
    debounce: DebounceTracker,
    app_state: AppLifecycle,
    running: Option<JoinHandle<Option<bool>>>,
    reply: Option<oneshot::Sender<bool>>,
}

impl RefreshScheduler {
    /// Start the scheduler task.
    ///
    /// `updates` is the store's change feed; without one the scheduler polls.
    pub fn spawn(
        engine: Arc<ContinueWatchingEngine>,
        updates: Option<broadcast::Receiver<ProgressEvent>>,
        settings: SchedulerSettings,
    ) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);

        let scheduler = Self {
            engine: Arc::clone(&engine),
            settings,
            commands: rx,
            updates,
            debounce: DebounceTracker::new(settings.debounce),
            app_state: AppLifecycle::Active,
            running: None,
            reply: None,
        };
        let task = tokio::spawn(scheduler.run());

        SchedulerHandle {
            commands: tx,
            engine,
            task,
        }
    }

    async fn run(mut self) {
        if self.updates.is_none() {
            tracing::info!(
                interval_secs = self.settings.poll_interval.as_secs(),
                "Progress store cannot push updates, polling"
            );
        }

        let period = self.settings.poll_interval;
        let mut poll = tokio::time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Refresh { foreground, reply }) => self.start(foreground, reply),
                    Some(Command::AppState(next)) => self.app_state_changed(next),
                    Some(Command::ExternalUpdate) => self.debounce.mark(),
                    Some(Command::Shutdown) | None => break,
                },

                update = recv_update(&mut self.updates) => match update {
                    Some(Ok(event)) => {
                        tracing::trace!(?event, "Progress updated");
                        self.debounce.mark();
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        tracing::debug!(skipped, "Progress update feed lagged");
                        self.debounce.mark();
                    }
                    Some(Err(RecvError::Closed)) | None => {
                        tracing::warn!("Progress update feed closed, falling back to polling");
                        self.updates = None;
                    }
                },

                _ = debounce::sleep_until(self.debounce.deadline()), if self.debounce.is_pending() => {
                    if self.debounce.take_due() {
                        self.start(false, None);
                    }
                }

                _ = poll.tick(), if self.updates.is_none() => {
                    self.start(false, None);
                }

                outcome = wait_running(&mut self.running) => {
                    self.running = None;
                    self.finish(outcome);
                }
            }
        }

        // Cycles are never cancelled mid-flight.
        if let Some(handle) = self.running.take() {
            let outcome = wait_running(&mut Some(handle)).await;
            self.finish(outcome);
        }
        self.engine.teardown();
        tracing::debug!("Refresh scheduler stopped");
    }

    fn start(&mut self, foreground: bool, reply: Option<oneshot::Sender<bool>>) {
        if self.running.is_some() {
            tracing::debug!(foreground, "Refresh in progress, dropping request");
            if let Some(reply) = reply {
                let _ = reply.send(self.engine.has_content());
            }
            return;
        }

        // The new cycle reads every update that arrived before it.
        self.debounce.clear();

        let engine = Arc::clone(&self.engine);
        self.running = Some(tokio::spawn(async move { engine.refresh(foreground).await }));
        self.reply = reply;
    }

    fn finish(&mut self, outcome: Option<bool>) {
        let has_content = outcome.unwrap_or_else(|| self.engine.has_content());
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(has_content);
        }
    }

    fn app_state_changed(&mut self, next: AppLifecycle) {
        let previous = std::mem::replace(&mut self.app_state, next);
        if previous != AppLifecycle::Active && next == AppLifecycle::Active {
            tracing::debug!(?previous, "App became active");
            self.start(false, None);
        }
    }
}

async fn recv_update(
    updates: &mut Option<broadcast::Receiver<ProgressEvent>>,
) -> Option<std::result::Result<ProgressEvent, RecvError>> {
    match updates {
        Some(rx) => Some(rx.recv().await),
        None => std::future::pending().await,
    }
}

async fn wait_running(running: &mut Option<JoinHandle<Option<bool>>>) -> Option<bool> {
    match running {
        Some(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Refresh task failed");
                None
            }
        },
        None => std::future::pending().await,
    }
}

/// Caller-facing side of a running [`RefreshScheduler`].
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    engine: Arc<ContinueWatchingEngine>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// First render: a foreground refresh.
    pub async fn mount(&self) -> bool {
        self.request(true).await
    }

    /// Explicit refresh. Returns whether the list is non-empty; a request
    /// dropped because a cycle is running answers with the current list.
    pub async fn refresh(&self, foreground: bool) -> bool {
        self.request(foreground).await
    }

    async fn request(&self, foreground: bool) -> bool {
        let (tx, rx) = oneshot::channel();
        let command = Command::Refresh {
            foreground,
            reply: Some(tx),
        };
        if self.commands.send(command).await.is_err() {
            return self.engine.has_content();
        }
        rx.await.unwrap_or_else(|_| self.engine.has_content())
    }

    /// Report an app lifecycle change. Becoming active from the background
    /// starts a background refresh.
    pub async fn app_state_changed(&self, state: AppLifecycle) {
        self.send(Command::AppState(state)).await;
    }

    /// Report an update made outside the progress store's change feed.
    pub async fn notify_external_update(&self) {
        self.send(Command::ExternalUpdate).await;
    }

    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            tracing::debug!("Refresh scheduler already stopped");
        }
    }

    /// Long-press delete of a displayed row.
    pub async fn remove_row(&self, row: &ContinueWatchingRow) -> Result<()> {
        self.engine.remove_row(row).await
    }

    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.engine.subscribe()
    }

    pub fn engine(&self) -> &Arc<ContinueWatchingEngine> {
        &self.engine
    }

    /// Stop the scheduler, wait for a running cycle and clear caches.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Refresh scheduler task failed");
        }
    }
}
