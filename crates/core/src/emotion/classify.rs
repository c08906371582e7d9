use crate::emotion::{AdjustedFrame, Emotion, BASE_CONFIDENCE_THRESHOLD};

// Surprise and sadness need more evidence than the rest; both are the labels
// the raw detector over-reports.
const SURPRISED_THRESHOLD: f32 = BASE_CONFIDENCE_THRESHOLD * 1.5;
const SAD_THRESHOLD: f32 = BASE_CONFIDENCE_THRESHOLD * 1.4;
const SPEAKING_PREFERENCE_BOOST: f32 = 1.2;

// Fixed iteration order; the first field to beat the running best wins ties.
const CANDIDATES: [Emotion; 6] = [
    Emotion::Happy,
    Emotion::Sad,
    Emotion::Angry,
    Emotion::Fearful,
    Emotion::Disgusted,
    Emotion::Surprised,
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub label: Emotion,
    pub confidence: f32,
}

/// Thresholded arg-max over an adjusted vector. Neutral is the running best
/// from the start, so any other label must clear both the current best and
/// its own per-label threshold to win. While the participant is speaking,
/// neutral and happy get a preference boost at assignment time so transient
/// speech artifacts do not displace them.
pub fn classify(frame: &AdjustedFrame) -> Classification {
    let mut best = Classification {
        label: Emotion::Neutral,
        confidence: frame.vector.neutral,
    };

    for label in CANDIDATES {
        let value = frame.vector.score(label);
        let threshold = match label {
            Emotion::Surprised => SURPRISED_THRESHOLD,
            Emotion::Sad => SAD_THRESHOLD,
            _ => BASE_CONFIDENCE_THRESHOLD,
        };
        if value > best.confidence && value > threshold {
            let boosted = frame.is_speaking
                && matches!(label, Emotion::Neutral | Emotion::Happy);
            best = Classification {
                label,
                confidence: if boosted {
                    value * SPEAKING_PREFERENCE_BOOST
                } else {
                    value
                },
            };
        }
    }

    best
}
