use crate::emotion::Emotion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Minimum spacing between committed samples. The detection loop runs much
/// faster than this; the gate lives here so the log enforces its own
/// one-second resolution regardless of who feeds it.
pub const MIN_COMMIT_INTERVAL_MS: u64 = 1000;

/// Share of the session a non-neutral label must cover to be reported as
/// dominant on its own.
const DOMINANCE_SHARE: f64 = 0.17;

/// The last sample has no successor; it is attributed exactly one second.
const FINAL_SAMPLE_SECONDS: f64 = 1.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionSample {
    pub timestamp_ms: u64,
    pub label: Emotion,
    pub confidence: f32,
}

/// Ordered, append-only emotion log for one active session. Samples are
/// created by the frame sampler, consumed once by [`SessionAggregator`] and
/// never mutated.
#[derive(Debug, Default)]
pub struct SessionEmotionLog {
    samples: Vec<EmotionSample>,
}

impl SessionEmotionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample unless the commit gate rejects it. Returns whether
    /// the sample was committed. Rejections: a timestamp that would break
    /// the non-decreasing order, or less than [`MIN_COMMIT_INTERVAL_MS`]
    /// since the last committed sample.
    pub fn try_commit(&mut self, sample: EmotionSample) -> bool {
        if let Some(last) = self.samples.last() {
            if sample.timestamp_ms < last.timestamp_ms {
                return false;
            }
            if sample.timestamp_ms - last.timestamp_ms < MIN_COMMIT_INTERVAL_MS {
                return false;
            }
        }
        self.samples.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[EmotionSample] {
        &self.samples
    }

    fn take(&mut self) -> Vec<EmotionSample> {
        std::mem::take(&mut self.samples)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionEmotionSummary {
    pub total_duration_sec: u64,
    pub duration_by_label: BTreeMap<Emotion, f64>,
    pub threshold_sec: u64,
    pub dominant_label: Emotion,
}

impl SessionEmotionSummary {
    fn empty() -> Self {
        Self {
            total_duration_sec: 0,
            duration_by_label: BTreeMap::new(),
            threshold_sec: 0,
            dominant_label: Emotion::Neutral,
        }
    }
}

/// Owns the emotion log of the active session and reduces it to a single
/// dominant label when the session completes. A non-neutral label is only
/// reported when it covers a substantial share of the session; otherwise the
/// statistically dominant state (usually neutral) is reported instead.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    log: Mutex<SessionEmotionLog>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits one sample through the log's gate.
    pub fn commit(&self, sample: EmotionSample) -> bool {
        self.lock_log().try_commit(sample)
    }

    pub fn committed_samples(&self) -> usize {
        self.lock_log().len()
    }

    /// Reduces the log to a summary and clears it; logs never carry over
    /// between sessions.
    pub fn finish(&self) -> SessionEmotionSummary {
        let samples = self.lock_log().take();
        summarize(&samples)
    }

    /// Discards the log without producing a summary (session aborted).
    pub fn clear(&self) {
        self.lock_log().take();
    }

    fn lock_log(&self) -> MutexGuard<'_, SessionEmotionLog> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn summarize(samples: &[EmotionSample]) -> SessionEmotionSummary {
    if samples.is_empty() {
        return SessionEmotionSummary::empty();
    }

    let mut duration_by_label: BTreeMap<Emotion, f64> = BTreeMap::new();
    for (index, sample) in samples.iter().enumerate() {
        let seconds = match samples.get(index + 1) {
            Some(next) => (next.timestamp_ms - sample.timestamp_ms) as f64 / 1000.0,
            None => FINAL_SAMPLE_SECONDS,
        };
        *duration_by_label.entry(sample.label).or_insert(0.0) += seconds;
    }

    let total: f64 = duration_by_label.values().sum();
    let total_duration_sec = (total.round() as u64).max(1);
    let threshold_sec = (total_duration_sec as f64 * DOMINANCE_SHARE).ceil() as u64;

    // BTreeMap iterates in the enum's declaration order, so ties resolve to
    // the earlier label.
    let best_non_neutral = duration_by_label
        .iter()
        .filter(|(label, _)| **label != Emotion::Neutral)
        .fold(None::<(Emotion, f64)>, |best, (label, secs)| match best {
            Some((_, best_secs)) if *secs <= best_secs => best,
            _ => Some((*label, *secs)),
        });

    let dominant_label = match best_non_neutral {
        Some((label, secs)) if secs >= threshold_sec as f64 => label,
        _ => duration_by_label
            .iter()
            .fold(None::<(Emotion, f64)>, |best, (label, secs)| match best {
                Some((_, best_secs)) if *secs <= best_secs => best,
                _ => Some((*label, *secs)),
            })
            .map(|(label, _)| label)
            .unwrap_or(Emotion::Neutral),
    };

    SessionEmotionSummary {
        total_duration_sec,
        duration_by_label,
        threshold_sec,
        dominant_label,
    }
}
