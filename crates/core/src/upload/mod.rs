mod dummy;
mod http;

use crate::capture::MediaFile;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use dummy::DummyUploader;
pub use http::HttpAnswerUploader;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
    Image,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(MediaType::Video),
            "audio" => Some(MediaType::Audio),
            "image" => Some(MediaType::Image),
            _ => None,
        }
    }
}

/// One finished answer, ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct AnswerUpload {
    pub question_id: u64,
    pub user_id: u64,
    pub media_type: MediaType,
    pub file: MediaFile,
}

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload rejected with status {0}: {1}")]
    HttpStatus(u16, String),

    #[error("invalid upload endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Accepts one finished answer file as a multipart request.
///
/// Failures are surfaced to the caller and never retried here; the file only
/// exists as the in-memory handle the caller still holds.
pub trait AnswerUploader: Send + Sync {
    fn upload(&self, answer: AnswerUpload) -> BoxFuture<'_, Result<(), UploadError>>;
}
