use crate::report::{EmotionReport, EmotionReporter, ReportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Records reports instead of sending them.
#[derive(Clone, Default)]
pub struct DummyReporter {
    received: Arc<Mutex<Vec<EmotionReport>>>,
}

impl DummyReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<EmotionReport> {
        self.lock_received().clone()
    }

    fn lock_received(&self) -> MutexGuard<'_, Vec<EmotionReport>> {
        match self.received.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EmotionReporter for DummyReporter {
    fn report(&self, report: EmotionReport) -> BoxFuture<'_, Result<(), ReportError>> {
        async move {
            tracing::debug!(
                emotion = report.emotion.as_code(),
                "recorded emotion report without sending"
            );
            self.lock_received().push(report);
            Ok(())
        }
        .boxed()
    }
}
