mod scripted;

use crate::emotion::ExpressionVector;
use futures::future::BoxFuture;

pub use scripted::ScriptedDetector;

#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("expression detector backend failed: {0}")]
    Backend(String),
}

/// Facial-expression detection capability.
///
/// One invocation per frame. `Ok(None)` means "nothing to report" — the
/// backing model is still loading or no face is currently visible — and is
/// not an error; the sampler simply produces no sample for that frame.
pub trait ExpressionDetector: Send + Sync {
    fn detect(&self) -> BoxFuture<'_, Result<Option<ExpressionVector>, DetectError>>;
}
