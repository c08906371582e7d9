mod controller;
mod mime;
mod synthetic;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use controller::{CaptureController, CaptureState};
pub use mime::{negotiate_mime_type, MimeCandidate, MimeSelection, DEFAULT_MIME_CANDIDATES};
pub use synthetic::{SyntheticEncoder, SyntheticMediaDevices, SyntheticTrack, TrackProbe};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One device track handle.
///
/// A track is owned by exactly one party; whoever owns it stops it exactly
/// once. `clone_track` produces an independent handle onto the same device:
/// stopping the clone never affects the handle it was cloned from, which is
/// what lets a recording borrow a live preview without tearing it down.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;
    fn clone_track(&self) -> Box<dyn MediaTrack>;
    fn stop(&self);
    fn is_ended(&self) -> bool;
}

/// Requested device characteristics, mirroring what the capture frontend
/// asks for: a user-facing 720p camera and a cleaned-up 44.1 kHz microphone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub user_facing: bool,
    pub audio: bool,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub audio_sample_rate_hz: u32,
}

impl Default for DeviceConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            user_facing: true,
            audio: true,
            echo_cancellation: true,
            noise_suppression: true,
            audio_sample_rate_hz: 44_100,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecorderSettings {
    pub audio_bits_per_second: u32,
    pub video_bits_per_second: u32,
    /// How often the encoder flushes a chunk while recording.
    pub timeslice_ms: u64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            audio_bits_per_second: 128_000,
            video_bits_per_second: 2_500_000,
            timeslice_ms: 1000,
        }
    }
}

/// A finalized recording: the concatenated chunks tagged with the negotiated
/// container type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaFile {
    pub data: Bytes,
    pub mime_type: String,
    pub file_extension: String,
}

impl MediaFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `recording-<stamp>.<ext>`, the naming the product uses for saved
    /// answers.
    pub fn suggested_file_name(&self, stamp: &str) -> String {
        format!("recording-{stamp}.{}", self.file_extension)
    }
}

/// Events emitted by an active encoder. `Stopped` is the asynchronous stop
/// acknowledgment: it arrives after the final chunks have been flushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    Chunk(Bytes),
    Stopped,
}

/// An already-open live preview. Read-only shared state: the capture
/// controller clones tracks out of it and never stops the originals, so the
/// on-screen preview keeps running across recordings.
pub struct PreviewStream {
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl PreviewStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Box<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn clone_tracks(&self) -> Vec<Box<dyn MediaTrack>> {
        self.tracks.iter().map(|t| t.clone_track()).collect()
    }

    /// Stops the preview's own tracks. Only the preview's owner calls this;
    /// recordings that cloned from it are unaffected.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("media device access denied: {0}")]
    PermissionDenied(String),

    #[error("no video track available")]
    NoVideoTrack,

    #[error("no supported recording format among candidates")]
    NoSupportedFormat,

    #[error("recorder backend failed: {0}")]
    RecorderFailed(String),

    #[error("nothing to return: no finalized file and no active recording")]
    NothingToReturn,

    #[error("a finalize is already pending")]
    FinalizePending,

    #[error("capture session was reset before it finalized")]
    ResetBeforeFinalize,
}

/// Media device capability. May deny access outright or hand back zero audio
/// tracks; the latter is a soft degradation the controller records through.
pub trait MediaDevices: Send + Sync {
    fn acquire(
        &self,
        constraints: DeviceConstraints,
    ) -> BoxFuture<'_, Result<Vec<Box<dyn MediaTrack>>, CaptureError>>;
}

/// Capture/encode capability.
///
/// `is_type_supported` is the platform's container/codec probe; `start`
/// begins encoding the given tracks and returns a control handle plus the
/// event stream the chunks and the stop acknowledgment arrive on.
pub trait MediaEncoder: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn start(
        &self,
        tracks: &[Box<dyn MediaTrack>],
        mime_type: &str,
        settings: RecorderSettings,
    ) -> Result<(Box<dyn RecorderControl>, mpsc::Receiver<RecorderEvent>), CaptureError>;
}

/// Handle over an active encoder. `request_stop` only requests: the
/// `RecorderEvent::Stopped` acknowledgment arrives asynchronously once the
/// remaining chunks have been flushed.
pub trait RecorderControl: Send + std::fmt::Debug {
    fn request_stop(&self);
}
