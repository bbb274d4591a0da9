//! Remote watch history.
//!
//! - [`client`] -- collaborator trait and event types
//! - [`trakt`] -- Trakt implementation
//! - [`merger`] -- folds history into local progress and up-next candidates

pub mod client;
pub mod merger;
pub mod trakt;

pub use client::{HistoryClient, ShowIds, WatchedEpisode};
pub use merger::{latest_per_show, HistoryMerger, LatestWatch};
pub use trakt::TraktClient;
