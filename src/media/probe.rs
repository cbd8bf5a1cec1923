use std::fmt;
use std::path::Path;
use tracing::info;

use super::error::JobError;
use super::ladder::MIN_SOURCE_WIDTH;
use super::process::ProcessInvoker;

/// Codec of the first video stream as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCodec {
    H264,
    Hevc,
    Vp9,
    Other(String),
}

impl InputCodec {
    pub fn from_probe_name(name: &str) -> Self {
        match name {
            "h264" => InputCodec::H264,
            "hevc" => InputCodec::Hevc,
            "vp9" => InputCodec::Vp9,
            other => InputCodec::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputCodec::H264 => f.write_str("h264"),
            InputCodec::Hevc => f.write_str("hevc"),
            InputCodec::Vp9 => f.write_str("vp9"),
            InputCodec::Other(name) => f.write_str(name),
        }
    }
}

/// Codecs that have a hardware decode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedCodec {
    H264,
    Hevc,
    Vp9,
}

impl SupportedCodec {
    pub fn qsv_decoder(&self) -> &'static str {
        match self {
            SupportedCodec::H264 => "h264_qsv",
            SupportedCodec::Hevc => "hevc_qsv",
            SupportedCodec::Vp9 => "vp9_qsv",
        }
    }
}

impl TryFrom<&InputCodec> for SupportedCodec {
    type Error = JobError;

    fn try_from(codec: &InputCodec) -> Result<Self, Self::Error> {
        match codec {
            InputCodec::H264 => Ok(SupportedCodec::H264),
            InputCodec::Hevc => Ok(SupportedCodec::Hevc),
            InputCodec::Vp9 => Ok(SupportedCodec::Vp9),
            InputCodec::Other(name) => Err(JobError::UnsupportedCodec(name.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbeResult {
    pub codec: InputCodec,
    pub width: u32,
    pub frame_count: u64,
    pub duration: f64,
}

impl MediaProbeResult {
    pub fn frame_rate(&self) -> f64 {
        self.frame_count as f64 / self.duration
    }
}

pub fn probe_args(source: &Path) -> Vec<String> {
    [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-count_packets",
        "-show_entries",
        "stream=codec_name,width,nb_read_packets:format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(source.to_string_lossy().into_owned()))
    .collect()
}

fn field<'a>(values: &[&'a str], index: usize, name: &str) -> Result<&'a str, JobError> {
    values
        .get(index)
        .copied()
        .ok_or_else(|| JobError::ProbeParse(format!("missing {}", name)))
}

fn numeric<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, JobError> {
    value
        .parse()
        .map_err(|_| JobError::ProbeParse(format!("{} {:?} is not numeric", name, value)))
}

/// Parses ffprobe's unkeyed output: codec, width, packet count, duration.
pub fn parse_probe_output(stdout: &str) -> Result<MediaProbeResult, JobError> {
    let values: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let codec = field(&values, 0, "codec name")?;
    let width: u32 = numeric(field(&values, 1, "width")?, "width")?;
    let frame_count: u64 = numeric(field(&values, 2, "frame count")?, "frame count")?;
    let duration: f64 = numeric(field(&values, 3, "duration")?, "duration")?;

    if width < MIN_SOURCE_WIDTH {
        return Err(JobError::ProbeParse(format!("width {} is too narrow", width)));
    }
    if frame_count == 0 {
        return Err(JobError::ProbeParse("frame count is zero".into()));
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(JobError::ProbeParse(format!("duration {} is not positive", duration)));
    }

    Ok(MediaProbeResult {
        codec: InputCodec::from_probe_name(codec),
        width,
        frame_count,
        duration,
    })
}

pub async fn probe_source(
    tools: &dyn ProcessInvoker,
    ffprobe: &str,
    source: &Path,
) -> Result<MediaProbeResult, JobError> {
    let output = tools
        .run(ffprobe, &probe_args(source))
        .await
        .map_err(|e| JobError::Probe(format!("failed to run {}: {}", ffprobe, e)))?;

    if !output.exit.success() {
        return Err(JobError::Probe(format!(
            "{}: {}",
            output.exit,
            output.stderr.trim()
        )));
    }

    let result = parse_probe_output(&output.stdout)?;
    info!(
        codec = %result.codec,
        width = result.width,
        frames = result.frame_count,
        duration = result.duration,
        "🔎 Probed source"
    );
    Ok(result)
}
