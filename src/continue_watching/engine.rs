//! The refresh cycle and its published state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use upnext_common::{ContentId, ContentType, ContinueWatchingRow, EpisodeRef, ProgressEvent, Result};

use crate::config::EngineConfig;
use crate::continue_watching::aggregate::{finalize, group_records, rows_for_group};
use crate::history::{HistoryClient, HistoryMerger};
use crate::metadata::MetadataResolver;
use crate::store::ProgressStore;

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No cycle has completed yet.
    #[default]
    Initial,
    Idle,
    Refreshing,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineState {
    pub phase: Phase,
    /// True only while a foreground cycle runs.
    pub loading: bool,
    pub rows: Vec<ContinueWatchingRow>,
    pub has_content: bool,
    /// Error of the last cycle, cleared by the next successful one.
    pub last_error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Tunables of a refresh cycle.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub completion_threshold: f64,
    pub history_page_size: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        (&EngineConfig::default()).into()
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            completion_threshold: config.completion_threshold,
            history_page_size: config.history_page_size,
        }
    }
}

/// Builds the continue-watching list.
///
/// At most one cycle runs at a time; a request made while one is running is
/// dropped, not queued.
pub struct ContinueWatchingEngine {
    store: Arc<dyn ProgressStore>,
    resolver: MetadataResolver,
    history: Option<Arc<dyn HistoryClient>>,
    merger: Option<HistoryMerger>,
    settings: EngineSettings,
    cycle: Mutex<()>,
    state: watch::Sender<EngineState>,
    /// Bumped on every row removal.
    removal_generation: AtomicU64,
    /// Titles removed since the last publish, with their generation.
    removed: parking_lot::Mutex<Vec<(u64, (ContentType, ContentId))>>,
}

impl ContinueWatchingEngine {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        resolver: MetadataResolver,
        history: Option<Arc<dyn HistoryClient>>,
        settings: EngineSettings,
    ) -> Self {
        let merger = history.as_ref().map(|client| {
            HistoryMerger::new(
                Arc::clone(client),
                Arc::clone(&store),
                resolver.clone(),
                settings.history_page_size,
                settings.completion_threshold,
            )
        });
        let (state, _) = watch::channel(EngineState::default());

        Self {
            store,
            resolver,
            history,
            merger,
            settings,
            cycle: Mutex::new(()),
            state,
            removal_generation: AtomicU64::new(0),
            removed: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to published state.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Current published state.
    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn has_content(&self) -> bool {
        self.state.borrow().has_content
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    /// Change feed of the underlying store, if it has one.
    pub fn store_updates(&self) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.store.subscribe()
    }

    /// Run one refresh cycle.
    ///
    /// Returns whether the published list is non-empty, or `None` if another
    /// cycle was already running. A failed cycle keeps the previous list.
    pub async fn refresh(&self, foreground: bool) -> Option<bool> {
        let Ok(_guard) = self.cycle.try_lock() else {
            tracing::debug!(foreground, "Refresh already running, dropping request");
            return None;
        };

        self.state.send_modify(|s| {
            s.phase = Phase::Refreshing;
            s.loading = foreground;
        });

        let outcome = self.run_cycle(Utc::now()).await;

        // Removals made after the cycle read the store are not in its snapshot.
        {
            let mut removed = self.removed.lock();
            self.state.send_modify(|s| {
                s.phase = Phase::Idle;
                s.loading = false;
                match outcome {
                    Ok((mut rows, snapshot)) => {
                        rows.retain(|row| {
                            !removed.iter().any(|(generation, (content_type, content_id))| {
                                *generation > snapshot
                                    && row.title_key() == (*content_type, content_id)
                            })
                        });
                        s.has_content = !rows.is_empty();
                        s.rows = rows;
                        s.last_error = None;
                        s.last_refreshed = Some(Utc::now());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Refresh cycle failed, keeping previous list");
                        s.last_error = Some(e.to_string());
                    }
                }
            });
            removed.clear();
        }

        Some(self.has_content())
    }

    /// Build the rows, returning them with the removal generation seen
    /// before the store was read.
    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<(Vec<ContinueWatchingRow>, u64)> {
        // Synthetic writes must land before the store is read below.
        let remote = match &self.merger {
            Some(merger) => merger.run(now).await,
            None => Vec::new(),
        };

        let snapshot = self.removal_generation.load(Ordering::SeqCst);
        let records = self.store.get_all().await?;
        let groups = group_records(records);
        tracing::debug!(groups = groups.len(), remote = remote.len(), "Aggregating progress");

        // Lookups run concurrently; the resolver bounds how many hit the provider.
        let lookups: Vec<_> = groups
            .iter()
            .map(|group| self.resolver.resolve(group.content_type, &group.content_id))
            .collect();
        let resolved = join_all(lookups).await;

        let threshold = self.settings.completion_threshold;
        let mut local = Vec::new();
        for (group, meta) in groups.iter().zip(resolved) {
            match meta {
                Some(meta) => local.extend(rows_for_group(group, &meta, threshold, now)),
                None => {
                    tracing::debug!(content_id = %group.content_id, "Skipping title without metadata");
                }
            }
        }

        Ok((finalize(local, remote), snapshot))
    }

    /// Remove a displayed row.
    ///
    /// Deletes every local record of the title (leaving a removal tombstone),
    /// clears the remote resume point when signed in, and drops the row from
    /// the published list without running a cycle. Removing twice is
    /// harmless.
    pub async fn remove_row(&self, row: &ContinueWatchingRow) -> Result<()> {
        let removed = self
            .store
            .remove_all(row.content_type, &row.content_id)
            .await?;
        tracing::info!(content_id = %row.content_id, removed, "Removed from continue watching");

        if let Some(client) = self.history.as_ref().filter(|c| c.is_authenticated()) {
            let episode = row
                .season
                .zip(row.episode)
                .map(|(season, episode)| EpisodeRef::new(season, episode));
            if let Err(e) = client
                .delete_playback_for_content(&row.content_id, row.content_type, episode)
                .await
            {
                tracing::warn!(content_id = %row.content_id, error = %e, "Failed to remove remote playback");
            }
        }

        let generation = self.removal_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.removed
            .lock()
            .push((generation, (row.content_type, row.content_id.clone())));

        let key = row.title_key();
        self.state.send_modify(|s| {
            s.rows.retain(|r| r.title_key() != key);
            s.has_content = !s.rows.is_empty();
        });
        Ok(())
    }

    /// Release cached metadata.
    pub fn teardown(&self) {
        self.resolver.clear();
    }
}
