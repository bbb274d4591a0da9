use std::time::Duration;
use tokio::time::Instant;

/// Collapses bursts of update events into a single deadline.
///
/// Every event pushes the deadline out by the quiet period; the burst is due
/// once no event arrived for that long.
#[derive(Debug)]
pub struct DebounceTracker {
    /// When the current burst settles, if one is pending
    deadline: Option<Instant>,
    /// How long events must stop before the burst is due
    quiet: Duration,
}

impl DebounceTracker {
    pub fn new(quiet: Duration) -> Self {
        Self {
            deadline: None,
            quiet,
        }
    }

    /// Record an update event
    pub fn mark(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending burst if it has settled.
    pub fn take_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
