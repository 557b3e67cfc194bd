use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag for an escalation sweep, checked before each complaint.
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct SweepCancellation {
    cancelled: Arc<AtomicBool>,
}

impl SweepCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
