mod adjust;
mod aggregate;
mod classify;

use serde::{Deserialize, Serialize};

pub use adjust::{adjust_frame, AdjustedFrame};
pub use aggregate::{
    EmotionSample, SessionAggregator, SessionEmotionLog, SessionEmotionSummary,
    MIN_COMMIT_INTERVAL_MS,
};
pub use classify::{classify, Classification};

/// Base acceptance threshold shared by the classifier and the sample commit
/// gate. Per-label thresholds are derived from it (see [`classify`]).
pub const BASE_CONFIDENCE_THRESHOLD: f32 = 0.3;

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
    ];

    /// Upper-case code used on the wire by the emotion-report endpoint.
    pub fn as_code(&self) -> &'static str {
        match self {
            Emotion::Neutral => "NEUTRAL",
            Emotion::Happy => "HAPPY",
            Emotion::Sad => "SAD",
            Emotion::Angry => "ANGRY",
            Emotion::Fearful => "FEARFUL",
            Emotion::Disgusted => "DISGUSTED",
            Emotion::Surprised => "SURPRISED",
        }
    }
}

/// Seven independent per-expression confidences from the face detector.
/// Scores are in `[0, 1]` individually and are not required to sum to 1.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpressionVector {
    pub neutral: f32,
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
    pub fearful: f32,
    pub disgusted: f32,
    pub surprised: f32,
}

impl ExpressionVector {
    pub fn score(&self, emotion: Emotion) -> f32 {
        match emotion {
            Emotion::Neutral => self.neutral,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Angry => self.angry,
            Emotion::Fearful => self.fearful,
            Emotion::Disgusted => self.disgusted,
            Emotion::Surprised => self.surprised,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_codes_are_upper_case() {
        for emotion in Emotion::ALL {
            let code = emotion.as_code();
            assert_eq!(code, code.to_uppercase());
        }
    }

    #[test]
    fn score_reads_the_matching_field() {
        let v = ExpressionVector {
            neutral: 0.1,
            happy: 0.2,
            sad: 0.3,
            angry: 0.4,
            fearful: 0.5,
            disgusted: 0.6,
            surprised: 0.7,
        };
        assert_eq!(v.score(Emotion::Neutral), 0.1);
        assert_eq!(v.score(Emotion::Surprised), 0.7);
    }
}
