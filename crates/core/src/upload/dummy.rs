use crate::upload::{AnswerUpload, AnswerUploader, UploadError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Records uploads instead of sending them; optionally fails every call so
/// the no-retry contract can be exercised.
#[derive(Clone, Default)]
pub struct DummyUploader {
    received: Arc<Mutex<Vec<AnswerUpload>>>,
    fail: bool,
}

impl DummyUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload fails with a synthetic server error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn received(&self) -> Vec<AnswerUpload> {
        self.lock_received().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.lock_received().len()
    }

    fn lock_received(&self) -> MutexGuard<'_, Vec<AnswerUpload>> {
        match self.received.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AnswerUploader for DummyUploader {
    fn upload(&self, answer: AnswerUpload) -> BoxFuture<'_, Result<(), UploadError>> {
        async move {
            if self.fail {
                return Err(UploadError::HttpStatus(
                    500,
                    "synthetic upload failure".to_owned(),
                ));
            }
            tracing::debug!(
                question_id = answer.question_id,
                bytes = answer.file.len(),
                "recorded upload without sending"
            );
            self.lock_received().push(answer);
            Ok(())
        }
        .boxed()
    }
}
