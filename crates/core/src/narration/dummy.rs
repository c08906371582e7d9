use crate::narration::{NarrationError, NarrationPlayback, Narrator};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Playback handle that only tracks whether it was stopped.
pub struct DummyPlayback {
    active: Arc<AtomicBool>,
}

impl NarrationPlayback for DummyPlayback {
    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Narrator that plays nothing but keeps every handle it handed out, so
/// tests can assert which narrations are still running.
#[derive(Default)]
pub struct DummyNarrator {
    playbacks: Mutex<Vec<Arc<AtomicBool>>>,
}

impl DummyNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observers over every playback handed out, in creation order.
    pub fn playbacks(&self) -> Vec<DummyPlayback> {
        self.lock_playbacks()
            .iter()
            .map(|active| DummyPlayback {
                active: Arc::clone(active),
            })
            .collect()
    }

    fn lock_playbacks(&self) -> MutexGuard<'_, Vec<Arc<AtomicBool>>> {
        match self.playbacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Narrator for DummyNarrator {
    fn narrate(
        &self,
        text: String,
    ) -> BoxFuture<'_, Result<Box<dyn NarrationPlayback>, NarrationError>> {
        async move {
            tracing::debug!(chars = text.len(), "starting silent narration");
            let active = Arc::new(AtomicBool::new(true));
            self.lock_playbacks().push(Arc::clone(&active));
            Ok(Box::new(DummyPlayback { active }) as Box<dyn NarrationPlayback>)
        }
        .boxed()
    }
}
