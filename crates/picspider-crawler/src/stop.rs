use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a crawl and its controller.
///
/// The crawl polls it at category, page, album and download submission
/// boundaries. Work already in flight always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stop: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }
}
