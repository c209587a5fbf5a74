use std::fmt;
use std::sync::Arc;

type Sink = dyn Fn(&str) + Send + Sync;

/// Routes crawl progress and diagnostics to a caller supplied sink.
///
/// Every line also goes through the `log` facade at its level. Without an
/// explicit sink, lines are printed to stdout.
#[derive(Clone)]
pub struct Reporter {
    sink: Option<Arc<Sink>>,
}

impl Reporter {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// Only emits through the `log` facade.
    pub fn log_only() -> Self {
        Self { sink: None }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        log::info!("{msg}");
        self.emit(msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        log::warn!("{msg}");
        self.emit(msg);
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        log::error!("{msg}");
        self.emit(msg);
    }

    fn emit(&self, msg: &str) {
        if let Some(sink) = &self.sink {
            sink(msg);
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(|msg| println!("{msg}"))
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("sink", &self.sink.as_ref().map(|_| "Fn(&str)"))
            .finish()
    }
}
