use std::path::Path;
use tracing::{info, warn};

use super::process::{ProcessInvoker, ProcessOutput};
use crate::infrastructure::storage::upload::UploadTarget;

pub const THUMBNAIL_SLOTS: u8 = 3;

/// Fill 1280x720, then keep only frames that open a new scene.
const SCENE_FILTER: &str =
    "scale=1280:720:force_original_aspect_ratio=increase,crop=1280:720,select=gt(scene\\,0.25)";
/// Picks a representative frame without a scene threshold.
const FALLBACK_FILTER: &str = "thumbnail";
/// ffmpeg's warning when no frame made it through the filter graph.
const EMPTY_OUTPUT_MARKER: &str = "Output file is empty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailSlot {
    Primary,
    Fallback,
    Failed(String),
}

impl ThumbnailSlot {
    pub fn is_extracted(&self) -> bool {
        !matches!(self, ThumbnailSlot::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSet {
    pub slots: [ThumbnailSlot; THUMBNAIL_SLOTS as usize],
}

impl ThumbnailSet {
    pub fn extracted(&self) -> usize {
        self.slots.iter().filter(|s| s.is_extracted()).count()
    }
}

/// Everything a thumbnail pass needs about one job.
pub struct ThumbnailJob<'a> {
    pub ffmpeg: &'a str,
    pub source: &'a Path,
    pub duration: f64,
    pub owner_id: &'a str,
    pub video_id: &'a str,
    pub target: &'a UploadTarget,
}

/// Seek offset in whole seconds for slot `1..=3`.
pub fn seek_offset(duration: f64, slot: u8) -> u64 {
    (duration / f64::from(THUMBNAIL_SLOTS)).floor() as u64 * u64::from(slot.saturating_sub(1))
}

fn thumbnail_args(job: &ThumbnailJob<'_>, slot: u8, filter: &str) -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "warning".into(),
        "-ss".into(),
        seek_offset(job.duration, slot).to_string(),
        "-i".into(),
        job.source.to_string_lossy().into_owned(),
        "-vf".into(),
        filter.into(),
        "-update".into(),
        "1".into(),
        "-frames:v".into(),
        "1".into(),
        "-method".into(),
        "POST".into(),
        "-protocol_opts".into(),
        job.target.image_protocol_opts(),
        job.target.thumbnail_url(job.owner_id, job.video_id, slot),
    ]
}

fn is_empty_output(output: &ProcessOutput) -> bool {
    output.stderr.contains(EMPTY_OUTPUT_MARKER)
}

fn failure(output: &ProcessOutput) -> ThumbnailSlot {
    let reason = output
        .stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim();
    ThumbnailSlot::Failed(format!("{}: {}", output.exit, reason))
}

async fn extract_slot(tools: &dyn ProcessInvoker, job: &ThumbnailJob<'_>, slot: u8) -> ThumbnailSlot {
    let primary = match tools.run(job.ffmpeg, &thumbnail_args(job, slot, SCENE_FILTER)).await {
        Ok(output) => output,
        Err(e) => return ThumbnailSlot::Failed(format!("failed to run {}: {}", job.ffmpeg, e)),
    };

    if !is_empty_output(&primary) {
        return if primary.exit.success() {
            ThumbnailSlot::Primary
        } else {
            failure(&primary)
        };
    }

    info!(slot, "No scene change near offset, using fallback filter");
    match tools.run(job.ffmpeg, &thumbnail_args(job, slot, FALLBACK_FILTER)).await {
        Ok(output) if is_empty_output(&output) => {
            ThumbnailSlot::Failed("fallback filter produced no frame".into())
        }
        Ok(output) if output.exit.success() => ThumbnailSlot::Fallback,
        Ok(output) => failure(&output),
        Err(e) => ThumbnailSlot::Failed(format!("failed to run {}: {}", job.ffmpeg, e)),
    }
}

/// Extracts and uploads all slots. Slots fail independently and never
/// abort the job.
pub async fn extract_thumbnails(tools: &dyn ProcessInvoker, job: &ThumbnailJob<'_>) -> ThumbnailSet {
    let mut slots: [ThumbnailSlot; THUMBNAIL_SLOTS as usize] =
        std::array::from_fn(|_| ThumbnailSlot::Failed("not attempted".into()));

    for (slot, outcome) in (1..=THUMBNAIL_SLOTS).zip(slots.iter_mut()) {
        *outcome = extract_slot(tools, job, slot).await;
        if let ThumbnailSlot::Failed(reason) = outcome {
            warn!(slot, "Thumbnail slot failed: {}", reason);
        }
    }

    let set = ThumbnailSet { slots };
    info!("🖼️ Thumbnails uploaded ({}/{})", set.extracted(), THUMBNAIL_SLOTS);
    set
}
