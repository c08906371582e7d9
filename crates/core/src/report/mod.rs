mod dummy;
mod http;

use crate::emotion::Emotion;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use dummy::DummyReporter;
pub use http::HttpEmotionReporter;

/// Which kind of prompt the participant was answering; the reporting backend
/// files the emotion under it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnswerType {
    Basic,
    Personal,
    CognitiveAudio,
    CognitiveImage,
}

impl AnswerType {
    pub fn as_code(&self) -> &'static str {
        match self {
            AnswerType::Basic => "BASIC",
            AnswerType::Personal => "PERSONAL",
            AnswerType::CognitiveAudio => "COGNITIVE_AUDIO",
            AnswerType::CognitiveImage => "COGNITIVE_IMAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" | "BASIC" => Some(AnswerType::Basic),
            "personal" | "PERSONAL" => Some(AnswerType::Personal),
            "cognitive-audio" | "COGNITIVE_AUDIO" => Some(AnswerType::CognitiveAudio),
            "cognitive-image" | "COGNITIVE_IMAGE" => Some(AnswerType::CognitiveImage),
            _ => None,
        }
    }
}

/// One per completed session: the dominant label for the whole answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmotionReport {
    pub emotion: Emotion,
    pub answer_type: AnswerType,
}

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("emotion report request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("emotion report rejected with status {0}: {1}")]
    HttpStatus(u16, String),

    #[error("invalid report endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

pub trait EmotionReporter: Send + Sync {
    fn report(&self, report: EmotionReport) -> BoxFuture<'_, Result<(), ReportError>>;
}
