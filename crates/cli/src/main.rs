#![deny(warnings)]

use affect_capture_core::capture::{
    CaptureController, DeviceConstraints, MediaDevices, PreviewStream, RecorderSettings,
    SyntheticEncoder, SyntheticMediaDevices,
};
use affect_capture_core::config::{
    parse_answer_type, parse_frame_interval_ms, parse_media_type, resolve_api_token,
    resolve_optional_string, AnswerTarget, AppConfig, StdEnv, DEFAULT_ANSWER_TYPE,
    DEFAULT_FRAME_INTERVAL_MS, DEFAULT_MEDIA_TYPE, ENV_API_BASE_URL, ENV_API_TOKEN, ENV_USER_ID,
};
use affect_capture_core::detect::ScriptedDetector;
use affect_capture_core::emotion::ExpressionVector;
use affect_capture_core::narration::{DummyNarrator, NarrationOwner, Narrator};
use affect_capture_core::report::{DummyReporter, EmotionReporter, HttpEmotionReporter};
use affect_capture_core::session::{AnswerParams, AnswerSession};
use affect_capture_core::upload::{AnswerUploader, DummyUploader, HttpAnswerUploader};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "affect-capture")]
#[command(about = "Records one spoken answer while sampling facial affect in the background")]
struct Args {
    #[arg(long, env = ENV_API_BASE_URL)]
    api_base: Option<String>,

    #[arg(long, env = ENV_API_TOKEN)]
    api_token: Option<String>,

    #[arg(long, default_value_t = 1)]
    question_id: u64,

    #[arg(long, env = ENV_USER_ID, default_value_t = 1)]
    user_id: u64,

    #[arg(long, default_value = DEFAULT_MEDIA_TYPE)]
    media_type: String,

    #[arg(long, default_value = DEFAULT_ANSWER_TYPE)]
    answer_type: String,

    /// How long to keep recording after the countdown.
    #[arg(long, default_value_t = 5)]
    record_secs: u64,

    #[arg(long, default_value_t = 3)]
    countdown_secs: u32,

    #[arg(long, default_value_t = DEFAULT_FRAME_INTERVAL_MS)]
    frame_interval_ms: u64,

    /// Where to save the finalized recording.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let record_secs = args.record_secs;
    let countdown_secs = args.countdown_secs;
    let output = args.output.clone();
    let cfg = build_config(args, &env)?;

    tracing::info!(
        question_id = cfg.target.question_id,
        user_id = cfg.target.user_id,
        media_type = cfg.target.media_type.as_str(),
        api = cfg.api_base_url.as_deref().unwrap_or("<local only>"),
        "config loaded"
    );

    run_answer(cfg, countdown_secs, record_secs, output).await
}

async fn run_answer(
    cfg: AppConfig,
    countdown_secs: u32,
    record_secs: u64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let devices = Arc::new(SyntheticMediaDevices::new());
    let encoder = Arc::new(SyntheticEncoder::default());
    let controller = Arc::new(
        CaptureController::new(
            Arc::clone(&devices) as Arc<dyn MediaDevices>,
            encoder,
        )
        .with_constraints(cfg.constraints)
        .with_settings(cfg.recorder),
    );

    let detector = Arc::new(ScriptedDetector::cycling(demo_frames()));
    let narration = Arc::new(NarrationOwner::new(
        Arc::new(DummyNarrator::new()) as Arc<dyn Narrator>
    ));

    let uploader: Arc<dyn AnswerUploader> = match &cfg.api_base_url {
        Some(base) => {
            let mut uploader = HttpAnswerUploader::new(base)?;
            if let Some(token) = &cfg.api_token {
                uploader = uploader.with_bearer_token(token.expose());
            }
            Arc::new(uploader)
        }
        None => {
            tracing::info!("no api base configured; the upload stays local");
            Arc::new(DummyUploader::new())
        }
    };
    let reporter: Arc<dyn EmotionReporter> = match &cfg.api_base_url {
        Some(base) => {
            let mut reporter = HttpEmotionReporter::new(base)?;
            if let Some(token) = &cfg.api_token {
                reporter = reporter.with_bearer_token(token.expose());
            }
            Arc::new(reporter)
        }
        None => Arc::new(DummyReporter::new()),
    };

    // A live preview stays open across the whole run; the recording clones
    // its tracks instead of grabbing the devices a second time.
    let preview = PreviewStream::new(devices.acquire(cfg.constraints).await?);

    let session = AnswerSession::new(
        controller,
        detector,
        uploader,
        reporter,
        narration,
        AnswerParams {
            question_id: cfg.target.question_id,
            user_id: cfg.target.user_id,
            media_type: cfg.target.media_type,
            answer_type: cfg.target.answer_type,
        },
    )
    .with_frame_interval(Duration::from_millis(cfg.frame_interval_ms));

    session
        .read_prompt("What memory does this bring back? Take your time and answer out loud.")
        .await?;
    session
        .begin_with_countdown(countdown_secs, Some(&preview))
        .await?;

    tracing::info!(record_secs, "recording; answer the prompt now");
    tokio::time::sleep(Duration::from_secs(record_secs)).await;

    let outcome = session.finish().await?;
    preview.stop_all();

    tracing::info!(
        bytes = outcome.file.len(),
        mime_type = %outcome.file.mime_type,
        dominant = outcome.summary.dominant_label.as_code(),
        total_sec = outcome.summary.total_duration_sec,
        "answer complete"
    );
    if let Err(e) = &outcome.upload {
        tracing::error!(error = %e, "upload failed; saving locally is the only copy");
    }
    if let Err(e) = &outcome.report {
        tracing::warn!(error = %e, "emotion report failed");
    }

    if let Some(path) = output {
        std::fs::write(&path, &outcome.file.data)
            .with_context(|| format!("failed to write recording to {}", path.display()))?;
        tracing::info!(path = %path.display(), "recording saved");
    }

    Ok(())
}

/// Frames the demo detector cycles through: mostly neutral with stretches of
/// an obvious smile, plus a gap where no face is visible.
fn demo_frames() -> Vec<Option<ExpressionVector>> {
    let neutral = ExpressionVector {
        neutral: 0.85,
        happy: 0.1,
        ..Default::default()
    };
    let happy = ExpressionVector {
        neutral: 0.2,
        happy: 0.75,
        ..Default::default()
    };
    vec![
        Some(neutral),
        Some(neutral),
        Some(happy),
        Some(happy),
        Some(happy),
        None,
    ]
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(
    args: Args,
    env: &impl affect_capture_core::config::Env,
) -> anyhow::Result<AppConfig> {
    let media_type = parse_media_type(&args.media_type)?;
    let answer_type = parse_answer_type(&args.answer_type)?;
    let frame_interval_ms = parse_frame_interval_ms(args.frame_interval_ms)?;

    let api_base_url = resolve_optional_string(args.api_base, ENV_API_BASE_URL, env);
    let api_token = resolve_api_token(args.api_token, ENV_API_TOKEN, env)?;

    Ok(AppConfig {
        api_base_url,
        api_token,
        target: AnswerTarget {
            question_id: args.question_id,
            user_id: args.user_id,
            media_type,
            answer_type,
        },
        constraints: DeviceConstraints::default(),
        recorder: RecorderSettings::default(),
        frame_interval_ms,
    })
}
