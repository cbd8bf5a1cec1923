use tracing::{info, warn};

use crate::media::acquisition::download_source;
use crate::media::error::JobError;
use crate::media::hls::{run_transcode, transcode_args};
use crate::media::ladder::plan_ladder;
use crate::media::probe::{SupportedCodec, probe_source};
use crate::media::progress::ProgressMonitor;
use crate::media::thumbnails::{ThumbnailJob, extract_thumbnails};
use crate::media::workspace::ScratchWorkspace;
use crate::modules::video::events::TranscodeJob;
use crate::state::AppState;

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub renditions: Vec<u32>,
    pub gop_length: u32,
    pub thumbnails: usize,
    pub duration_seconds: i32,
}

/// Runs one job end to end. The scratch workspace is gone by the time this
/// returns, whatever the outcome.
pub async fn process_job(
    state: &AppState,
    job: &TranscodeJob,
    source_url: &str,
) -> Result<JobSummary, JobError> {
    let workspace = ScratchWorkspace::new(&state.config.scratch_dir, job.owner_id(), job.video_id())?;

    let result = run_pipeline(state, job, source_url, &workspace).await;

    workspace.cleanup();
    result
}

async fn run_pipeline(
    state: &AppState,
    job: &TranscodeJob,
    source_url: &str,
    workspace: &ScratchWorkspace,
) -> Result<JobSummary, JobError> {
    let video_id = job.video_id();
    let owner_id = job.owner_id();
    let tools = state.tools.as_ref();

    state
        .videos
        .mark_processing(video_id)
        .await
        .map_err(JobError::metadata("mark processing"))?;

    info!("⬇️ Downloading raw video...");
    let source = workspace.source_path(job.filename())?;
    download_source(&state.http, source_url, &source).await?;

    let probe = probe_source(tools, &state.config.ffprobe_path, &source).await?;

    let codec = match SupportedCodec::try_from(&probe.codec) {
        Ok(codec) => codec,
        Err(e) => {
            warn!("Rejecting source: {}", e);
            workspace.cleanup();
            return Err(e);
        }
    };

    let thumbnails = extract_thumbnails(
        tools,
        &ThumbnailJob {
            ffmpeg: &state.config.ffmpeg_path,
            source: &source,
            duration: probe.duration,
            owner_id,
            video_id,
            target: &state.upload_target,
        },
    )
    .await;

    state
        .videos
        .set_thumbnails_ready(video_id)
        .await
        .map_err(JobError::metadata("thumbnails ready"))?;

    let ladder = plan_ladder(&probe);
    info!(
        renditions = ladder.len(),
        gop = ladder.encoder.gop_length,
        "📐 Planned bitrate ladder"
    );

    let args = transcode_args(codec, &source, &ladder, &state.upload_target, owner_id, video_id);
    let monitor = ProgressMonitor::new(
        video_id,
        probe.frame_count,
        state.progress.as_ref(),
        state.videos.as_ref(),
    );
    run_transcode(tools, &state.config.ffmpeg_path, &args, monitor).await?;

    info!("📢 Publishing video...");
    let duration_seconds = probe.duration.round() as i32;
    state
        .videos
        .publish(video_id, duration_seconds)
        .await
        .map_err(JobError::metadata("publish"))?;

    if let Err(e) = state.progress.report(video_id, 100).await {
        warn!("Failed to publish final progress: {}", e);
    }

    if let Err(e) = state.storage.delete_raw(job.filename()).await {
        warn!("Failed to delete raw upload {}: {}", job.filename(), e);
    }

    Ok(JobSummary {
        renditions: ladder.renditions.iter().map(|r| r.width).collect(),
        gop_length: ladder.encoder.gop_length,
        thumbnails: thumbnails.extracted(),
        duration_seconds,
    })
}
