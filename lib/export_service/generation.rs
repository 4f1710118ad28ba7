use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic run counter used to cancel export runs without aborting requests.
///
/// Cancellation here is advisory: bumping the generation never interrupts an
/// in-flight page fetch. Instead, every result is checked against the gate on
/// arrival and quietly discarded when its run has been superseded.
#[derive(Debug, Default)]
pub struct GenerationGate {
    current: AtomicU64,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Starts a new run and returns its generation number. Any previous run
    /// becomes stale immediately.
    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// True while `generation` is still the live run.
    pub fn is_current(&self, generation: u64) -> bool {
        self.current.load(Ordering::SeqCst) == generation
    }

    /// Invalidates the live run. In-flight work drains on its own and its
    /// results are dropped on arrival.
    pub fn cancel(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}
