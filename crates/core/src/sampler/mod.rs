use crate::detect::ExpressionDetector;
use crate::emotion::{
    adjust_frame, classify, EmotionSample, ExpressionVector, SessionAggregator,
    BASE_CONFIDENCE_THRESHOLD,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Delay between detection attempts. The commit gate throttles the log to one
/// sample per second; this only paces how often the detector is polled.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Drives the continuous detection loop for one session: detect, adjust,
/// classify, then try to commit the sample through the aggregator's gate.
/// The loop reschedules after every attempt regardless of the commit outcome
/// and stops only through [`SamplerHandle::cancel`].
pub struct FrameSampler {
    detector: Arc<dyn ExpressionDetector>,
    aggregator: Arc<SessionAggregator>,
    frame_interval: Duration,
}

impl FrameSampler {
    pub fn new(detector: Arc<dyn ExpressionDetector>, aggregator: Arc<SessionAggregator>) -> Self {
        Self {
            detector,
            aggregator,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Spawns the detection loop. Timestamps are measured from this call, so
    /// each session's log starts near zero.
    pub fn start(&self) -> SamplerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let detector = Arc::clone(&self.detector);
        let aggregator = Arc::clone(&self.aggregator);
        let frame_interval = self.frame_interval;

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut prev: Option<ExpressionVector> = None;

            loop {
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                match detector.detect().await {
                    Ok(Some(raw)) => {
                        let frame = adjust_frame(&raw, prev.as_ref());
                        prev = Some(raw);

                        let classification = classify(&frame);
                        // Re-check after the await: a cancelled sampler must
                        // not commit anything.
                        if !flag.load(Ordering::SeqCst)
                            && classification.confidence > BASE_CONFIDENCE_THRESHOLD
                        {
                            let sample = EmotionSample {
                                timestamp_ms: started.elapsed().as_millis() as u64,
                                label: classification.label,
                                confidence: classification.confidence,
                            };
                            if aggregator.commit(sample) {
                                tracing::debug!(
                                    label = ?classification.label,
                                    confidence = classification.confidence,
                                    "committed emotion sample"
                                );
                            }
                        }
                    }
                    // Model still loading or no face visible; not a sample.
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "expression detection failed");
                    }
                }

                if flag.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(frame_interval).await;
            }
        });

        SamplerHandle { cancelled, task }
    }
}

/// Handle over a running detection loop.
pub struct SamplerHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Cancels the loop synchronously: once this returns, no further
    /// detection is scheduled and no further sample can be committed.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for SamplerHandle {
    // Dropping the handle (component unmount, navigation) must not leave an
    // orphaned loop polling the camera.
    fn drop(&mut self) {
        self.cancel();
    }
}
