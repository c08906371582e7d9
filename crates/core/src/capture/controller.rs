use crate::capture::{
    negotiate_mime_type, CaptureError, DeviceConstraints, MediaDevices, MediaEncoder, MediaFile,
    MediaTrack, MimeCandidate, MimeSelection, PreviewStream, RecorderControl, RecorderEvent,
    RecorderSettings, DEFAULT_MIME_CANDIDATES,
};
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Acquiring,
    Recording,
    Stopping,
    Finalized,
}

struct Inner {
    state: CaptureState,
    /// Bumped on every start/teardown so chunk pumps from a replaced session
    /// cannot touch the current one.
    epoch: u64,
    tracks: Vec<Box<dyn MediaTrack>>,
    chunks: Vec<Bytes>,
    selection: Option<MimeSelection>,
    recorder: Option<Box<dyn RecorderControl>>,
    final_file: Option<MediaFile>,
    /// Single-slot pending-completion resolver for `stop_and_get_file`,
    /// fulfilled exactly once by the stop-acknowledgment handler.
    pending: Option<oneshot::Sender<MediaFile>>,
    auto_started: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            epoch: 0,
            tracks: Vec::new(),
            chunks: Vec::new(),
            selection: None,
            recorder: None,
            final_file: None,
            pending: None,
            auto_started: false,
        }
    }
}

/// State machine for one answer recording at a time.
///
/// Owns every track it clones or acquires and stops each exactly once on
/// every path out of `Recording`/`Finalized` — stop, reset, or a new start
/// replacing the previous session.
pub struct CaptureController {
    devices: Arc<dyn MediaDevices>,
    encoder: Arc<dyn MediaEncoder>,
    constraints: DeviceConstraints,
    settings: RecorderSettings,
    candidates: &'static [MimeCandidate],
    inner: Arc<Mutex<Inner>>,
}

impl CaptureController {
    pub fn new(devices: Arc<dyn MediaDevices>, encoder: Arc<dyn MediaEncoder>) -> Self {
        Self {
            devices,
            encoder,
            constraints: DeviceConstraints::default(),
            settings: RecorderSettings::default(),
            candidates: DEFAULT_MIME_CANDIDATES,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    pub fn with_constraints(mut self, constraints: DeviceConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_settings(mut self, settings: RecorderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_candidates(mut self, candidates: &'static [MimeCandidate]) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn state(&self) -> CaptureState {
        lock_inner(&self.inner).state
    }

    /// Whether the current/most recent session was started automatically
    /// (countdown) rather than by an explicit button press.
    pub fn auto_started(&self) -> bool {
        lock_inner(&self.inner).auto_started
    }

    /// Starts a new capture session, tearing down any previous one first.
    /// Prefers cloning tracks from an open preview so the on-screen preview
    /// keeps working; without one, requests a fresh combined source.
    pub async fn start(
        &self,
        is_auto: bool,
        preview: Option<&PreviewStream>,
    ) -> Result<(), CaptureError> {
        // Re-entrant start while recording behaves as stop-then-start; two
        // live sessions must never hold overlapping device handles.
        self.teardown();

        let epoch = {
            let mut inner = lock_inner(&self.inner);
            inner.state = CaptureState::Acquiring;
            inner.epoch
        };

        let tracks = match preview {
            Some(preview) => {
                let cloned = preview.clone_tracks();
                tracing::debug!(tracks = cloned.len(), "cloned tracks from live preview");
                cloned
            }
            None => match self.devices.acquire(self.constraints).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    lock_inner(&self.inner).state = CaptureState::Idle;
                    return Err(e);
                }
            },
        };

        if !tracks.iter().any(|t| t.kind() == crate::capture::TrackKind::Video) {
            for track in &tracks {
                track.stop();
            }
            lock_inner(&self.inner).state = CaptureState::Idle;
            return Err(CaptureError::NoVideoTrack);
        }
        if !tracks.iter().any(|t| t.kind() == crate::capture::TrackKind::Audio) {
            tracing::warn!("no audio track available, recording video only");
        }

        let selection = match negotiate_mime_type(&*self.encoder, self.candidates) {
            Ok(selection) => selection,
            Err(e) => {
                for track in &tracks {
                    track.stop();
                }
                lock_inner(&self.inner).state = CaptureState::Idle;
                return Err(e);
            }
        };

        let (control, events) = match self.encoder.start(&tracks, &selection.mime_type, self.settings)
        {
            Ok(started) => started,
            Err(e) => {
                for track in &tracks {
                    track.stop();
                }
                lock_inner(&self.inner).state = CaptureState::Idle;
                return Err(e);
            }
        };

        {
            let mut inner = lock_inner(&self.inner);
            if inner.epoch != epoch {
                // A reset raced the acquisition; this session never existed.
                drop(inner);
                for track in &tracks {
                    track.stop();
                }
                return Err(CaptureError::ResetBeforeFinalize);
            }
            inner.tracks = tracks;
            inner.chunks.clear();
            inner.selection = Some(selection.clone());
            inner.recorder = Some(control);
            inner.final_file = None;
            inner.auto_started = is_auto;
            inner.state = CaptureState::Recording;
        }

        self.spawn_event_pump(epoch, events);

        tracing::info!(
            mime_type = %selection.mime_type,
            auto = is_auto,
            "recording started"
        );
        Ok(())
    }

    /// Requests the recorder to stop. Finalization happens when the
    /// asynchronous stop acknowledgment arrives. No-op when not recording.
    pub fn stop(&self) {
        let inner = lock_inner(&self.inner);
        self.request_stop_locked(inner);
    }

    /// Returns the finalized file, stopping the recording first if needed.
    ///
    /// Already finalized: the same file is returned immediately, as often as
    /// asked, without re-invoking the recorder. Recording or stopping: a
    /// pending-completion slot is registered and fulfilled by the stop
    /// acknowledgment. The slot is single-use — a second concurrent caller
    /// gets an error rather than silently displacing the first.
    pub async fn stop_and_get_file(&self) -> Result<MediaFile, CaptureError> {
        let rx = {
            let mut inner = lock_inner(&self.inner);
            match inner.state {
                CaptureState::Finalized => {
                    return inner
                        .final_file
                        .clone()
                        .ok_or(CaptureError::NothingToReturn);
                }
                CaptureState::Recording | CaptureState::Stopping => {
                    if inner.pending.is_some() {
                        return Err(CaptureError::FinalizePending);
                    }
                    let (tx, rx) = oneshot::channel();
                    inner.pending = Some(tx);
                    self.request_stop_locked(inner);
                    rx
                }
                CaptureState::Idle | CaptureState::Acquiring => {
                    return Err(CaptureError::NothingToReturn);
                }
            }
        };

        rx.await.map_err(|_| CaptureError::ResetBeforeFinalize)
    }

    /// Unconditionally tears down the session: force-stops the recorder,
    /// stops all owned tracks, discards chunks and any finalized file, and
    /// returns to `Idle`. Any caller awaiting a finalize gets an error.
    pub fn reset(&self) {
        tracing::debug!("capture session reset");
        self.teardown();
    }

    fn request_stop_locked(&self, mut inner: MutexGuard<'_, Inner>) {
        if inner.state != CaptureState::Recording {
            tracing::debug!(state = ?inner.state, "stop requested while not recording, ignoring");
            return;
        }
        inner.state = CaptureState::Stopping;
        if let Some(recorder) = inner.recorder.as_ref() {
            recorder.request_stop();
        }
    }

    fn spawn_event_pump(&self, epoch: u64, mut events: mpsc::Receiver<RecorderEvent>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    RecorderEvent::Chunk(chunk) => {
                        let mut guard = lock_inner(&inner);
                        if guard.epoch != epoch {
                            break;
                        }
                        if matches!(
                            guard.state,
                            CaptureState::Recording | CaptureState::Stopping
                        ) {
                            tracing::debug!(bytes = chunk.len(), "recorder chunk received");
                            guard.chunks.push(chunk);
                        }
                    }
                    RecorderEvent::Stopped => {
                        finalize(&inner, epoch);
                        break;
                    }
                }
            }
        });
    }

    fn teardown(&self) {
        let mut inner = lock_inner(&self.inner);
        inner.epoch += 1;
        if let Some(recorder) = inner.recorder.take() {
            recorder.request_stop();
        }
        for track in inner.tracks.drain(..) {
            track.stop();
        }
        inner.chunks.clear();
        inner.selection = None;
        inner.final_file = None;
        inner.auto_started = false;
        // Whoever is awaiting a finalize learns the session went away.
        drop(inner.pending.take());
        inner.state = CaptureState::Idle;
    }
}

/// Stop-acknowledgment handler: concatenates the chunks into the final file,
/// releases the tracks, and fulfills a pending `stop_and_get_file` exactly
/// once. Ignored when the session was reset or replaced before the
/// acknowledgment arrived.
fn finalize(inner: &Arc<Mutex<Inner>>, epoch: u64) {
    let mut guard = lock_inner(inner);
    if guard.epoch != epoch {
        return;
    }
    if !matches!(
        guard.state,
        CaptureState::Recording | CaptureState::Stopping
    ) {
        return;
    }
    let Some(selection) = guard.selection.clone() else {
        return;
    };

    let chunks = std::mem::take(&mut guard.chunks);
    let mut data = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
    for chunk in &chunks {
        data.extend_from_slice(chunk);
    }
    let file = MediaFile {
        data: Bytes::from(data),
        mime_type: selection.mime_type,
        file_extension: selection.file_extension,
    };

    guard.recorder = None;
    for track in guard.tracks.drain(..) {
        track.stop();
    }

    tracing::info!(
        bytes = file.len(),
        chunks = chunks.len(),
        mime_type = %file.mime_type,
        "recording finalized"
    );

    guard.final_file = Some(file.clone());
    guard.state = CaptureState::Finalized;
    if let Some(pending) = guard.pending.take() {
        // The receiver may have given up; fulfilling is best-effort.
        let _ = pending.send(file);
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticEncoder, SyntheticMediaDevices, SyntheticTrack, TrackKind};
    use std::time::Duration;

    fn controller_with(
        devices: Arc<SyntheticMediaDevices>,
        encoder: SyntheticEncoder,
    ) -> CaptureController {
        CaptureController::new(devices, Arc::new(encoder))
    }

    fn fast_encoder() -> SyntheticEncoder {
        SyntheticEncoder::default().with_chunk_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn records_and_finalizes_a_file() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, None).await.unwrap();
        assert_eq!(controller.state(), CaptureState::Recording);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let file = controller.stop_and_get_file().await.unwrap();
        assert!(!file.is_empty());
        assert_eq!(file.file_extension, "mp4");
        assert_eq!(controller.state(), CaptureState::Finalized);
    }

    #[tokio::test]
    async fn plain_stop_finalizes_on_the_acknowledgment() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.stop();

        // The acknowledgment arrives asynchronously; give it a beat.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.state(), CaptureState::Finalized);
        let file = controller.stop_and_get_file().await.unwrap();
        assert!(!file.is_empty());

        // A second stop is a no-op, not an error.
        controller.stop();
        assert_eq!(controller.state(), CaptureState::Finalized);
    }

    #[tokio::test]
    async fn stop_and_get_file_is_idempotent_after_finalize() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let first = controller.stop_and_get_file().await.unwrap();
        let second = controller.stop_and_get_file().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tracks_are_stopped_after_each_session() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.stop_and_get_file().await.unwrap();
        assert!(devices.issued().iter().all(|p| p.is_ended()));

        controller.start(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.stop_and_get_file().await.unwrap();
        assert!(devices.issued().iter().all(|p| p.is_ended()));
    }

    #[tokio::test]
    async fn starting_again_tears_down_the_previous_session() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.start(false, None).await.unwrap();

        let issued = devices.issued();
        // The first session's two tracks ended; the replacement's are live.
        let (ended, live): (Vec<_>, Vec<_>) = issued.iter().partition(|p| p.is_ended());
        assert_eq!(ended.len(), 2);
        assert_eq!(live.len(), 2);
        controller.reset();
    }

    #[tokio::test]
    async fn preview_clones_leave_the_preview_running() {
        let preview = PreviewStream::new(vec![
            Box::new(SyntheticTrack::new(TrackKind::Video, "preview camera")),
            Box::new(SyntheticTrack::new(TrackKind::Audio, "preview microphone")),
        ]);
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, Some(&preview)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.stop_and_get_file().await.unwrap();

        // No device acquisition happened and the preview tracks still run.
        assert!(devices.issued().is_empty());
        assert!(preview.tracks().iter().all(|t| !t.is_ended()));
    }

    #[tokio::test]
    async fn stop_is_a_no_op_when_not_recording() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.stop();
        assert_eq!(controller.state(), CaptureState::Idle);

        let err = controller.stop_and_get_file().await.unwrap_err();
        assert!(matches!(err, CaptureError::NothingToReturn));
    }

    #[tokio::test]
    async fn denied_devices_leave_the_controller_idle() {
        let devices = Arc::new(SyntheticMediaDevices::denying());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        let err = controller.start(false, None).await.unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(controller.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn unsupported_formats_fail_the_session_and_release_tracks() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let encoder = SyntheticEncoder::supporting(Vec::new());
        let controller = controller_with(Arc::clone(&devices), encoder);

        let err = controller.start(false, None).await.unwrap_err();
        assert!(matches!(err, CaptureError::NoSupportedFormat));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(devices.issued().iter().all(|p| p.is_ended()));
    }

    #[tokio::test]
    async fn video_only_acquisition_still_records() {
        let devices = Arc::new(SyntheticMediaDevices::without_audio());
        let controller = controller_with(Arc::clone(&devices), fast_encoder());

        controller.start(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let file = controller.stop_and_get_file().await.unwrap();
        assert!(!file.is_empty());
    }

    #[tokio::test]
    async fn reset_discards_everything_and_fails_pending_awaiters() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        // Slow stop acknowledgment keeps the finalize pending while we reset.
        let encoder = fast_encoder().with_stop_delay(Duration::from_millis(200));
        let controller = Arc::new(controller_with(Arc::clone(&devices), encoder));

        controller.start(true, None).await.unwrap();
        assert!(controller.auto_started());

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.stop_and_get_file().await })
        };
        // Let the waiter register its pending slot before the reset.
        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.reset();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(CaptureError::ResetBeforeFinalize)));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(devices.issued().iter().all(|p| p.is_ended()));
    }

    #[tokio::test]
    async fn second_concurrent_finalize_waiter_is_rejected() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        // Slow stop acknowledgment keeps the first waiter pending.
        let encoder = fast_encoder().with_stop_delay(Duration::from_millis(200));
        let controller = Arc::new(controller_with(Arc::clone(&devices), encoder));

        controller.start(false, None).await.unwrap();
        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.stop_and_get_file().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = controller.stop_and_get_file().await;
        assert!(matches!(second, Err(CaptureError::FinalizePending)));

        assert!(first.await.unwrap().is_ok());
    }
}
