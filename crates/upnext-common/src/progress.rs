//! Completion math and the progress-store write rule.
//!
//! Both store implementations defer to [`decide_write`] so the SQLite and
//! in-memory stores agree on which writes land.

use chrono::Utc;

use crate::types::{ProgressOrigin, ProgressRecord, SetOptions};

/// Share of a title that must be watched before it counts as finished.
pub const DEFAULT_COMPLETION_THRESHOLD: f64 = 85.0;

/// `current_time / duration * 100`, clamped to `[0, 100]`.
///
/// A non-positive or non-finite duration yields 0.
pub fn percent(current_time: f64, duration: f64) -> f64 {
    if !(duration.is_finite() && duration > 0.0) || !current_time.is_finite() {
        return 0.0;
    }
    (current_time * 100.0 / duration).clamp(0.0, 100.0)
}

/// Whether `percent` reaches the completion `threshold`.
pub fn is_finished(percent: f64, threshold: f64) -> bool {
    percent >= threshold
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Outcome of comparing an incoming write against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// Store the incoming record.
    Write,
    /// The stored record is newer.
    RejectStale,
    /// A sync write would lower stored progress.
    RejectLessComplete,
}

impl WriteDecision {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write)
    }
}

/// Decide whether `incoming` may replace `existing`.
///
/// Last write wins on `last_updated`; an equal timestamp overwrites. Writes
/// that originate from remote sync never lower the stored percentage unless
/// `force_write` is set.
pub fn decide_write(
    existing: Option<&ProgressRecord>,
    incoming: &ProgressRecord,
    options: SetOptions,
) -> WriteDecision {
    let Some(existing) = existing else {
        return WriteDecision::Write;
    };

    if existing.last_updated > incoming.last_updated {
        return WriteDecision::RejectStale;
    }

    if !options.force_write
        && incoming.origin == ProgressOrigin::RemoteHistory
        && incoming.progress_percent() < existing.progress_percent()
    {
        return WriteDecision::RejectLessComplete;
    }

    WriteDecision::Write
}
