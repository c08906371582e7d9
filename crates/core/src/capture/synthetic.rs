use crate::capture::{
    CaptureError, DeviceConstraints, MediaDevices, MediaEncoder, MediaTrack, RecorderControl,
    RecorderEvent, RecorderSettings, TrackKind, DEFAULT_MIME_CANDIDATES,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// In-memory track handle. Stands in for a real device track in tests and in
/// the demo wiring; cloning yields an independent handle, as with real
/// device tracks.
pub struct SyntheticTrack {
    kind: TrackKind,
    label: String,
    ended: Arc<AtomicBool>,
}

impl SyntheticTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    fn with_flag(kind: TrackKind, label: String, ended: Arc<AtomicBool>) -> Self {
        Self { kind, label, ended }
    }
}

impl MediaTrack for SyntheticTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn clone_track(&self) -> Box<dyn MediaTrack> {
        // A clone is a new handle onto the same device, with its own
        // lifetime; it starts live even if this handle already ended.
        Box::new(SyntheticTrack::new(
            self.kind,
            format!("{} (clone)", self.label),
        ))
    }

    fn stop(&self) {
        tracing::debug!(track = %self.label, "track stopped");
        self.ended.store(true, Ordering::SeqCst);
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

/// Observer for a track the synthetic device handed out; lets tests assert
/// teardown without holding the track itself.
#[derive(Clone)]
pub struct TrackProbe {
    kind: TrackKind,
    ended: Arc<AtomicBool>,
}

impl TrackProbe {
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

/// In-memory media device capability: hands out synthetic tracks and records
/// a probe for each so their teardown can be observed.
pub struct SyntheticMediaDevices {
    deny: bool,
    provide_audio: bool,
    issued: Mutex<Vec<TrackProbe>>,
}

impl SyntheticMediaDevices {
    pub fn new() -> Self {
        Self {
            deny: false,
            provide_audio: true,
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Simulates the participant denying the permission prompt.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    /// Simulates a machine with a camera but no usable microphone.
    pub fn without_audio() -> Self {
        Self {
            provide_audio: false,
            ..Self::new()
        }
    }

    /// Probes for every track ever handed out, in acquisition order.
    pub fn issued(&self) -> Vec<TrackProbe> {
        self.lock_issued().clone()
    }

    fn lock_issued(&self) -> MutexGuard<'_, Vec<TrackProbe>> {
        match self.issued.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SyntheticMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDevices for SyntheticMediaDevices {
    fn acquire(
        &self,
        constraints: DeviceConstraints,
    ) -> BoxFuture<'_, Result<Vec<Box<dyn MediaTrack>>, CaptureError>> {
        async move {
            if self.deny {
                return Err(CaptureError::PermissionDenied(
                    "synthetic device denial".to_owned(),
                ));
            }

            let mut tracks: Vec<Box<dyn MediaTrack>> = Vec::new();
            let mut probes = Vec::new();

            let video_ended = Arc::new(AtomicBool::new(false));
            tracks.push(Box::new(SyntheticTrack::with_flag(
                TrackKind::Video,
                format!(
                    "synthetic camera {}x{}",
                    constraints.ideal_width, constraints.ideal_height
                ),
                Arc::clone(&video_ended),
            )));
            probes.push(TrackProbe {
                kind: TrackKind::Video,
                ended: video_ended,
            });

            if constraints.audio && self.provide_audio {
                let audio_ended = Arc::new(AtomicBool::new(false));
                tracks.push(Box::new(SyntheticTrack::with_flag(
                    TrackKind::Audio,
                    format!("synthetic microphone {} Hz", constraints.audio_sample_rate_hz),
                    Arc::clone(&audio_ended),
                )));
                probes.push(TrackProbe {
                    kind: TrackKind::Audio,
                    ended: audio_ended,
                });
            }

            self.lock_issued().extend(probes);
            Ok(tracks)
        }
        .boxed()
    }
}

/// In-memory capture/encode capability: emits a fixed payload on a timer and
/// acknowledges stop requests with a final flush followed by `Stopped`.
pub struct SyntheticEncoder {
    supported: Vec<String>,
    chunk_payload: Bytes,
    chunk_interval: Option<Duration>,
    stop_delay: Duration,
}

impl SyntheticEncoder {
    pub fn supporting(supported: Vec<String>) -> Self {
        Self {
            supported,
            chunk_payload: Bytes::from(vec![0u8; 1024]),
            chunk_interval: None,
            stop_delay: Duration::ZERO,
        }
    }

    /// Overrides the chunk cadence; without this, the recorder settings'
    /// timeslice applies.
    pub fn with_chunk_interval(mut self, interval: Duration) -> Self {
        self.chunk_interval = Some(interval);
        self
    }

    /// Delays the stop acknowledgment, mimicking an encoder that needs time
    /// to flush.
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn with_chunk_payload(mut self, payload: Bytes) -> Self {
        self.chunk_payload = payload;
        self
    }
}

impl Default for SyntheticEncoder {
    fn default() -> Self {
        Self::supporting(
            DEFAULT_MIME_CANDIDATES
                .iter()
                .map(|c| c.mime_type.to_owned())
                .collect(),
        )
    }
}

#[derive(Debug)]
struct SyntheticRecorderControl {
    stop: Arc<Notify>,
}

impl RecorderControl for SyntheticRecorderControl {
    fn request_stop(&self) {
        self.stop.notify_one();
    }
}

impl MediaEncoder for SyntheticEncoder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|s| s == mime_type)
    }

    fn start(
        &self,
        tracks: &[Box<dyn MediaTrack>],
        mime_type: &str,
        settings: RecorderSettings,
    ) -> Result<(Box<dyn RecorderControl>, mpsc::Receiver<RecorderEvent>), CaptureError> {
        if tracks.is_empty() {
            return Err(CaptureError::RecorderFailed(
                "cannot record an empty track set".to_owned(),
            ));
        }
        if !self.is_type_supported(mime_type) {
            return Err(CaptureError::RecorderFailed(format!(
                "unsupported mime type {mime_type}"
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let stop = Arc::new(Notify::new());
        let control = SyntheticRecorderControl {
            stop: Arc::clone(&stop),
        };

        let payload = self.chunk_payload.clone();
        let interval = self
            .chunk_interval
            .unwrap_or(Duration::from_millis(settings.timeslice_ms));
        let stop_delay = self.stop_delay;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.notified() => {
                        if !stop_delay.is_zero() {
                            tokio::time::sleep(stop_delay).await;
                        }
                        // Final flush, then the asynchronous acknowledgment.
                        let _ = tx.send(RecorderEvent::Chunk(payload.clone())).await;
                        let _ = tx.send(RecorderEvent::Stopped).await;
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if tx.send(RecorderEvent::Chunk(payload.clone())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok((Box::new(control), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_are_independent_handles() {
        let original = SyntheticTrack::new(TrackKind::Video, "camera");
        let clone = original.clone_track();

        clone.stop();
        assert!(clone.is_ended());
        assert!(!original.is_ended());

        original.stop();
        assert!(original.is_ended());
    }

    #[tokio::test]
    async fn acquisition_respects_audio_constraints() {
        let devices = SyntheticMediaDevices::new();
        let constraints = DeviceConstraints {
            audio: false,
            ..Default::default()
        };

        let tracks = devices.acquire(constraints).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].kind(), TrackKind::Video);
    }

    #[tokio::test]
    async fn encoder_emits_chunks_then_acknowledges_stop() {
        let devices = SyntheticMediaDevices::new();
        let tracks = devices.acquire(DeviceConstraints::default()).await.unwrap();

        let encoder = SyntheticEncoder::default().with_chunk_interval(Duration::from_millis(5));
        let (control, mut events) = encoder
            .start(&tracks, "video/mp4", RecorderSettings::default())
            .unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, RecorderEvent::Chunk(_)));

        control.request_stop();
        let mut saw_stop = false;
        while let Some(event) = events.recv().await {
            if event == RecorderEvent::Stopped {
                saw_stop = true;
                break;
            }
        }
        assert!(saw_stop);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_at_start() {
        let devices = SyntheticMediaDevices::new();
        let tracks = devices.acquire(DeviceConstraints::default()).await.unwrap();

        let encoder = SyntheticEncoder::supporting(vec!["video/webm".to_owned()]);
        assert!(!encoder.is_type_supported("video/mp4"));
        let err = encoder
            .start(&tracks, "video/mp4", RecorderSettings::default())
            .unwrap_err();
        assert!(matches!(err, CaptureError::RecorderFailed(_)));
    }
}
