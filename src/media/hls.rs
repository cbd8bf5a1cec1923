//! Multi-rendition QSV encode packaged as HLS and written straight to
//! object storage.

use std::path::Path;
use tracing::info;

use super::error::JobError;
use super::ladder::{Ladder, format_kbps};
use super::probe::SupportedCodec;
use super::process::ProcessInvoker;
use super::progress::{MonitorReport, ProgressMonitor};
use crate::infrastructure::storage::upload::UploadTarget;

pub const SEGMENT_SECONDS: u32 = 6;
pub const MASTER_PLAYLIST: &str = "master.m3u8";
const VIDEO_ENCODER: &str = "hevc_qsv";

/// `[0:v]split=N[v1]..; [vK]scale_qsv=W:-1[vKout];..; [0:a]asplit=N[a1]..`
pub fn filter_graph(ladder: &Ladder) -> String {
    let n = ladder.len();
    let video_pads: String = (1..=n).map(|k| format!("[v{k}]")).collect();
    let audio_pads: String = (1..=n).map(|k| format!("[a{k}]")).collect();
    let scalers: Vec<String> = ladder
        .renditions
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[v{k}]scale_qsv={w}:-1[v{k}out]", k = i + 1, w = r.width))
        .collect();

    format!(
        "[0:v]split={n}{video_pads}; {}; [0:a]asplit={n}{audio_pads}",
        scalers.join(";")
    )
}

/// Pairs video and audio branch `k` into variant stream `k`.
pub fn var_stream_map(variants: usize) -> String {
    (0..variants)
        .map(|k| format!("v:{k},a:{k}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

pub fn transcode_args(
    codec: SupportedCodec,
    source: &Path,
    ladder: &Ladder,
    target: &UploadTarget,
    owner_id: &str,
    video_id: &str,
) -> Vec<String> {
    let mut args = Vec::new();
    push_all(&mut args, &["-hwaccel", "qsv", "-c:v", codec.qsv_decoder(), "-i"]);
    args.push(source.to_string_lossy().into_owned());
    args.push("-filter_complex".into());
    args.push(filter_graph(ladder));

    let encoder = &ladder.encoder;
    let gop = encoder.gop_length.to_string();
    for (k, rendition) in ladder.renditions.iter().enumerate() {
        args.push("-map".into());
        args.push(format!("[v{}out]", k + 1));
        args.push(format!("-c:v:{k}"));
        args.push(VIDEO_ENCODER.into());
        args.push(format!("-b:v:{k}"));
        args.push(format_kbps(rendition.video_kbps));
        push_all(&mut args, &["-preset", encoder.preset]);
        if encoder.look_ahead {
            push_all(&mut args, &["-look_ahead", "1"]);
        }
        push_all(&mut args, &["-profile", encoder.profile, "-g", gop.as_str()]);
        if encoder.closed_gop {
            push_all(&mut args, &["-flags", "+cgop"]);
        }
    }

    for (k, rendition) in ladder.renditions.iter().enumerate() {
        args.push("-map".into());
        args.push(format!("[a{}]", k + 1));
        args.push(format!("-c:a:{k}"));
        args.push(rendition.audio_codec.into());
        args.push(format!("-b:a:{k}"));
        args.push(format_kbps(rendition.audio_kbps));
    }

    args.push("-var_stream_map".into());
    args.push(var_stream_map(ladder.len()));

    let prefix = target.video_prefix(owner_id, video_id);
    push_all(
        &mut args,
        &[
            "-f",
            "hls",
            "-hls_time",
            SEGMENT_SECONDS.to_string().as_str(),
            "-hls_playlist_type",
            "vod",
            "-hls_flags",
            "independent_segments",
            "-hls_segment_type",
            "fmp4",
            "-master_pl_name",
            MASTER_PLAYLIST,
            "-method",
            "POST",
            "-headers",
            target.hls_headers().as_str(),
            "-hls_segment_filename",
            format!("{prefix}/stream_%v/data%02d.m4s").as_str(),
            format!("{prefix}/stream_%v/main.m3u8").as_str(),
        ],
    );

    args
}

/// Runs the encode while `monitor` consumes its stderr. Resolves once the
/// process has exited and its stderr is drained.
pub async fn run_transcode(
    tools: &dyn ProcessInvoker,
    ffmpeg: &str,
    args: &[String],
    monitor: ProgressMonitor<'_>,
) -> Result<MonitorReport, JobError> {
    let process = tools
        .spawn(ffmpeg, args)
        .map_err(|e| JobError::TranscodeProcess(format!("failed to spawn {}: {}", ffmpeg, e)))?;

    info!("🎬 Transcoding video...");
    let (report, exit) = tokio::join!(monitor.run(process.stderr), process.exit);

    let exit = exit
        .map_err(|e| JobError::TranscodeProcess(format!("failed waiting on {}: {}", ffmpeg, e)))?;

    if !exit.success() {
        return Err(JobError::TranscodeProcess(format!(
            "{} exited with {}: {}",
            ffmpeg,
            exit,
            report.stderr_tail.join(" | ")
        )));
    }

    info!(samples = report.samples, "✅ Video transcoding done");
    Ok(report)
}
