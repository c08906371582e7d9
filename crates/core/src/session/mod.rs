use crate::capture::{CaptureController, CaptureError, MediaFile, PreviewStream};
use crate::detect::ExpressionDetector;
use crate::emotion::{SessionAggregator, SessionEmotionSummary};
use crate::narration::{NarrationError, NarrationOwner};
use crate::report::{AnswerType, EmotionReport, EmotionReporter, ReportError};
use crate::sampler::{FrameSampler, SamplerHandle};
use crate::upload::{AnswerUpload, AnswerUploader, MediaType, UploadError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Identifies which prompt is being answered and where the results go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnswerParams {
    pub question_id: u64,
    pub user_id: u64,
    pub media_type: MediaType,
    pub answer_type: AnswerType,
}

/// Everything a completed answer produced. Upload and report failures are
/// carried per-field rather than failing the whole session: the recording
/// and the summary still exist, and the caller decides what to do with them.
#[derive(Debug)]
pub struct AnswerOutcome {
    pub file: MediaFile,
    pub summary: SessionEmotionSummary,
    pub upload: Result<(), UploadError>,
    pub report: Result<(), ReportError>,
}

/// One bounded answer: capture and emotion sampling start together, and
/// finishing finalizes the recording, reduces the emotion log, uploads the
/// file and reports the dominant emotion.
///
/// Every training activity used to carry its own copy of this wiring, with
/// thresholds and mime lists drifting between copies; they now differ only
/// in the [`AnswerParams`] they pass in.
pub struct AnswerSession {
    controller: Arc<CaptureController>,
    sampler: FrameSampler,
    aggregator: Arc<SessionAggregator>,
    uploader: Arc<dyn AnswerUploader>,
    reporter: Arc<dyn EmotionReporter>,
    narration: Arc<NarrationOwner>,
    params: AnswerParams,
    active: Mutex<Option<SamplerHandle>>,
}

impl AnswerSession {
    pub fn new(
        controller: Arc<CaptureController>,
        detector: Arc<dyn ExpressionDetector>,
        uploader: Arc<dyn AnswerUploader>,
        reporter: Arc<dyn EmotionReporter>,
        narration: Arc<NarrationOwner>,
        params: AnswerParams,
    ) -> Self {
        let aggregator = Arc::new(SessionAggregator::new());
        let sampler = FrameSampler::new(detector, Arc::clone(&aggregator));
        Self {
            controller,
            sampler,
            aggregator,
            uploader,
            reporter,
            narration,
            params,
            active: Mutex::new(None),
        }
    }

    /// How often the detector is polled while the session runs.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.sampler = self.sampler.with_frame_interval(interval);
        self
    }

    pub fn params(&self) -> AnswerParams {
        self.params
    }

    /// Reads the prompt aloud. Any narration already playing (a previous
    /// prompt, a preparation hint) is replaced.
    pub async fn read_prompt(&self, text: &str) -> Result<(), NarrationError> {
        self.narration.speak(text).await
    }

    /// Starts recording and emotion sampling. The prompt narration stops —
    /// the participant is answering now.
    pub async fn begin(
        &self,
        is_auto: bool,
        preview: Option<&PreviewStream>,
    ) -> Result<(), CaptureError> {
        self.narration.stop();
        self.controller.start(is_auto, preview).await?;

        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            previous.cancel();
        }
        *active = Some(self.sampler.start());
        Ok(())
    }

    /// Counts down out loud, then begins an automatic recording.
    pub async fn begin_with_countdown(
        &self,
        seconds: u32,
        preview: Option<&PreviewStream>,
    ) -> Result<(), CaptureError> {
        for remaining in (1..=seconds).rev() {
            tracing::info!(remaining, "recording starts soon");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.begin(true, preview).await
    }

    /// Completes the answer: stops sampling, finalizes the recording, then
    /// sends the file and the emotion summary to their collaborators.
    ///
    /// A failed upload is logged and surfaced in the outcome, never retried;
    /// the finalized file rides along so the caller can still persist it.
    pub async fn finish(&self) -> Result<AnswerOutcome, CaptureError> {
        if let Some(handle) = self.lock_active().take() {
            handle.cancel();
        }

        let file = self.controller.stop_and_get_file().await?;
        let summary = self.aggregator.finish();
        tracing::info!(
            dominant = summary.dominant_label.as_code(),
            total_sec = summary.total_duration_sec,
            "session emotion summary"
        );

        let upload = self
            .uploader
            .upload(AnswerUpload {
                question_id: self.params.question_id,
                user_id: self.params.user_id,
                media_type: self.params.media_type,
                file: file.clone(),
            })
            .await;
        if let Err(e) = &upload {
            tracing::error!(error = %e, "answer upload failed; recording only exists in memory now");
        }

        let report = self
            .reporter
            .report(EmotionReport {
                emotion: summary.dominant_label,
                answer_type: self.params.answer_type,
            })
            .await;
        if let Err(e) = &report {
            tracing::warn!(error = %e, "emotion report failed");
        }

        Ok(AnswerOutcome {
            file,
            summary,
            upload,
            report,
        })
    }

    /// Abandons the answer: cancels sampling, tears the capture session down
    /// and discards the emotion log. Nothing is uploaded or reported. After
    /// this returns no device indicator may remain on.
    pub fn abort(&self) {
        self.narration.stop();
        if let Some(handle) = self.lock_active().take() {
            handle.cancel();
        }
        self.controller.reset();
        self.aggregator.clear();
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<SamplerHandle>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticEncoder, SyntheticMediaDevices};
    use crate::detect::ScriptedDetector;
    use crate::emotion::{Emotion, ExpressionVector};
    use crate::narration::{DummyNarrator, NarrationPlayback};
    use crate::report::DummyReporter;
    use crate::upload::DummyUploader;

    fn happy_frame() -> ExpressionVector {
        ExpressionVector {
            happy: 0.9,
            neutral: 0.1,
            ..Default::default()
        }
    }

    fn params() -> AnswerParams {
        AnswerParams {
            question_id: 11,
            user_id: 42,
            media_type: MediaType::Video,
            answer_type: AnswerType::Basic,
        }
    }

    struct Harness {
        session: AnswerSession,
        devices: Arc<SyntheticMediaDevices>,
        uploader: DummyUploader,
        reporter: DummyReporter,
        narrator: Arc<DummyNarrator>,
    }

    fn harness(uploader: DummyUploader) -> Harness {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let encoder =
            SyntheticEncoder::default().with_chunk_interval(Duration::from_millis(10));
        let controller = Arc::new(CaptureController::new(
            Arc::clone(&devices) as Arc<dyn crate::capture::MediaDevices>,
            Arc::new(encoder),
        ));
        let detector = Arc::new(ScriptedDetector::cycling([Some(happy_frame())]));
        let reporter = DummyReporter::new();
        let narrator = Arc::new(DummyNarrator::new());
        let narration = Arc::new(NarrationOwner::new(
            Arc::clone(&narrator) as Arc<dyn crate::narration::Narrator>
        ));

        let session = AnswerSession::new(
            controller,
            detector,
            Arc::new(uploader.clone()),
            Arc::new(reporter.clone()),
            narration,
            params(),
        )
        .with_frame_interval(Duration::from_millis(5));

        Harness {
            session,
            devices,
            uploader,
            reporter,
            narrator,
        }
    }

    #[tokio::test]
    async fn a_full_answer_uploads_and_reports() {
        let h = harness(DummyUploader::new());

        h.session.read_prompt("Tell me about your childhood home.").await.unwrap();
        h.session.begin(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let outcome = h.session.finish().await.unwrap();

        assert!(!outcome.file.is_empty());
        assert_eq!(outcome.summary.dominant_label, Emotion::Happy);
        assert!(outcome.upload.is_ok());
        assert!(outcome.report.is_ok());

        let uploads = h.uploader.received();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].question_id, 11);
        assert_eq!(uploads[0].file, outcome.file);

        let reports = h.reporter.received();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].emotion, Emotion::Happy);
        assert_eq!(reports[0].answer_type, AnswerType::Basic);

        assert!(h.devices.issued().iter().all(|p| p.is_ended()));
    }

    #[tokio::test]
    async fn beginning_an_answer_stops_the_prompt_narration() {
        let h = harness(DummyUploader::new());

        h.session.read_prompt("A long question being read aloud").await.unwrap();
        assert!(h.narrator.playbacks()[0].is_active());

        h.session.begin(false, None).await.unwrap();
        assert!(!h.narrator.playbacks()[0].is_active());

        h.session.abort();
    }

    #[tokio::test]
    async fn failed_upload_is_surfaced_but_the_report_still_goes_out() {
        let h = harness(DummyUploader::failing());

        h.session.begin(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let outcome = h.session.finish().await.unwrap();

        assert!(matches!(outcome.upload, Err(UploadError::HttpStatus(500, _))));
        // The recording survives in the outcome even though the upload died.
        assert!(!outcome.file.is_empty());
        assert_eq!(h.reporter.received().len(), 1);
        assert_eq!(h.uploader.upload_count(), 0);
    }

    #[tokio::test]
    async fn abort_sends_nothing_and_releases_devices() {
        let h = harness(DummyUploader::new());

        h.session.begin(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.session.abort();

        assert_eq!(h.uploader.upload_count(), 0);
        assert!(h.reporter.received().is_empty());
        assert!(h.devices.issued().iter().all(|p| p.is_ended()));

        // The next answer starts from a clean log.
        h.session.begin(false, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let outcome = h.session.finish().await.unwrap();
        assert_eq!(h.uploader.upload_count(), 1);
        assert!(outcome.summary.total_duration_sec <= 1);
    }

    #[tokio::test]
    async fn countdown_of_zero_begins_immediately() {
        let h = harness(DummyUploader::new());
        h.session.begin_with_countdown(0, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let outcome = h.session.finish().await.unwrap();
        assert!(outcome.upload.is_ok());
    }
}
