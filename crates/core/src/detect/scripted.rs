use crate::detect::{DetectError, ExpressionDetector};
use crate::emotion::ExpressionVector;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Detector that replays a prepared sequence of frames, then keeps yielding
/// `None` (or cycles from the start when built with [`cycling`]).
///
/// [`cycling`]: ScriptedDetector::cycling
pub struct ScriptedDetector {
    frames: Mutex<VecDeque<Option<ExpressionVector>>>,
    cycle: bool,
}

impl ScriptedDetector {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Option<ExpressionVector>>,
    {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
            cycle: false,
        }
    }

    /// Replays the sequence forever; handy for driving a live demo loop.
    pub fn cycling<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Option<ExpressionVector>>,
    {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
            cycle: true,
        }
    }

    pub fn remaining(&self) -> usize {
        self.lock_frames().len()
    }

    fn lock_frames(&self) -> MutexGuard<'_, VecDeque<Option<ExpressionVector>>> {
        match self.frames.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ExpressionDetector for ScriptedDetector {
    fn detect(&self) -> BoxFuture<'_, Result<Option<ExpressionVector>, DetectError>> {
        async move {
            let mut frames = self.lock_frames();
            let entry = frames.pop_front();
            if self.cycle {
                if let Some(frame) = entry {
                    frames.push_back(frame);
                }
            }
            Ok(entry.flatten())
        }
        .boxed()
    }
}
