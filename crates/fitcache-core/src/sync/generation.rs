use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter bumped on every identity change.
///
/// Remote calls capture the value when they start and drop their results if
/// it moved on by the time they finish.
#[derive(Debug, Default)]
pub struct SessionGeneration(AtomicU64);

impl SessionGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidate everything captured so far. Returns the new generation.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, captured: u64) -> bool {
        self.current() == captured
    }
}
