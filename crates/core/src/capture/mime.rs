use crate::capture::{CaptureError, MediaEncoder};

/// One container/codec candidate with the file extension a finalized
/// recording gets when the candidate wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MimeCandidate {
    pub mime_type: &'static str,
    pub file_extension: &'static str,
}

/// The negotiated container/codec for one capture session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeSelection {
    pub mime_type: String,
    pub file_extension: String,
}

/// Priority-ordered candidates: H.264+AAC MP4 first for the widest playback
/// and server-side compatibility, then WebM fallbacks for platforms that
/// cannot record MP4.
pub const DEFAULT_MIME_CANDIDATES: &[MimeCandidate] = &[
    MimeCandidate {
        mime_type: "video/mp4; codecs=\"avc1.424028, mp4a.40.2\"",
        file_extension: "mp4",
    },
    MimeCandidate {
        mime_type: "video/mp4; codecs=\"avc1.42E01E, mp4a.40.2\"",
        file_extension: "mp4",
    },
    MimeCandidate {
        mime_type: "video/mp4",
        file_extension: "mp4",
    },
    MimeCandidate {
        mime_type: "video/webm; codecs=\"vp9, opus\"",
        file_extension: "webm",
    },
    MimeCandidate {
        mime_type: "video/webm; codecs=\"vp8, opus\"",
        file_extension: "webm",
    },
    MimeCandidate {
        mime_type: "video/webm",
        file_extension: "webm",
    },
];

/// Picks the first candidate the encoder reports as supported. Deterministic
/// for a fixed supported set; fails when nothing on the list is supported.
pub fn negotiate_mime_type(
    encoder: &dyn MediaEncoder,
    candidates: &[MimeCandidate],
) -> Result<MimeSelection, CaptureError> {
    for candidate in candidates {
        if encoder.is_type_supported(candidate.mime_type) {
            tracing::debug!(mime_type = candidate.mime_type, "negotiated recording format");
            return Ok(MimeSelection {
                mime_type: candidate.mime_type.to_owned(),
                file_extension: candidate.file_extension.to_owned(),
            });
        }
    }
    Err(CaptureError::NoSupportedFormat)
}
