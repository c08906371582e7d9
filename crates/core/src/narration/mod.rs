mod dummy;

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};

pub use dummy::{DummyNarrator, DummyPlayback};

#[derive(thiserror::Error, Debug)]
pub enum NarrationError {
    #[error("narration synthesis failed: {0}")]
    Synthesis(String),
}

/// A narration currently being played. Playback internals belong to the
/// collaborator; the owner only ever stops a handle or asks if it still runs.
pub trait NarrationPlayback: Send + Sync {
    fn stop(&self);
    fn is_active(&self) -> bool;
}

/// Narration capability: text in, playable audio out.
pub trait Narrator: Send + Sync {
    fn narrate(&self, text: String) -> BoxFuture<'_, Result<Box<dyn NarrationPlayback>, NarrationError>>;
}

/// Single-slot owner of the currently playing narration.
///
/// Starting a new narration silently stops whichever one was playing, so at
/// most one is ever active per owner. This replaces the hidden module-level
/// "currently playing" variable with something tests can hold and inspect.
pub struct NarrationOwner {
    narrator: Arc<dyn Narrator>,
    current: Mutex<Option<Box<dyn NarrationPlayback>>>,
}

impl NarrationOwner {
    pub fn new(narrator: Arc<dyn Narrator>) -> Self {
        Self {
            narrator,
            current: Mutex::new(None),
        }
    }

    /// Synthesizes and starts playing `text`, stopping any narration this
    /// owner previously started.
    pub async fn speak<S: Into<String>>(&self, text: S) -> Result<(), NarrationError> {
        let playback = self.narrator.narrate(text.into()).await?;
        let mut current = self.lock_current();
        if let Some(previous) = current.take() {
            previous.stop();
        }
        *current = Some(playback);
        Ok(())
    }

    /// Stops and forgets the current narration, if any.
    pub fn stop(&self) {
        if let Some(playback) = self.lock_current().take() {
            playback.stop();
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.lock_current()
            .as_ref()
            .map(|p| p.is_active())
            .unwrap_or(false)
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Box<dyn NarrationPlayback>>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
