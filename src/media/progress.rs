use bytes::BytesMut;
use futures_util::StreamExt;
use regex::Regex;
use std::collections::VecDeque;
use std::io;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::Instant;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{info, warn};

use crate::infrastructure::redis::client::ProgressChannel;
use crate::modules::video::repository::VideoStore;

pub const REPORT_INTERVAL: Duration = Duration::from_millis(2500);
const STDERR_TAIL_LINES: usize = 20;

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").expect("invalid frame regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)").expect("invalid speed regex"));

/// Splits encoder stderr on `\n` or `\r`; ffmpeg redraws its status line
/// with carriage returns.
#[derive(Debug, Default)]
pub struct StatusLineCodec;

impl Decoder for StatusLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        while let Some(pos) = buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line = buf.split_to(pos + 1);
            let text = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub frames: u64,
    pub speed: f64,
}

impl ProgressSample {
    /// Takes the last `frame=` and `speed=` on the line; both must be present.
    pub fn parse(line: &str) -> Option<Self> {
        let frames = FRAME_RE.captures_iter(line).last()?[1].parse().ok()?;
        let speed = SPEED_RE.captures_iter(line).last()?[1].parse().ok()?;
        Some(Self { frames, speed })
    }

    pub fn percent(&self, total_frames: u64) -> u8 {
        if total_frames == 0 {
            return 0;
        }
        let pct = (self.frames as f64 / total_frames as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonitorReport {
    pub samples: usize,
    pub last_percent: u8,
    pub stderr_tail: Vec<String>,
}

/// Watches one encode and pushes throttled progress to the queue channel
/// and the video record. Sink failures are logged, never returned.
pub struct ProgressMonitor<'a> {
    video_id: &'a str,
    total_frames: u64,
    interval: Duration,
    channel: &'a dyn ProgressChannel,
    videos: &'a dyn VideoStore,
    last_accepted: Option<Instant>,
    last_percent: u8,
}

impl<'a> ProgressMonitor<'a> {
    pub fn new(
        video_id: &'a str,
        total_frames: u64,
        channel: &'a dyn ProgressChannel,
        videos: &'a dyn VideoStore,
    ) -> Self {
        Self {
            video_id,
            total_frames,
            interval: REPORT_INTERVAL,
            channel,
            videos,
            last_accepted: None,
            last_percent: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn due(&self, now: Instant) -> bool {
        self.last_accepted
            .is_none_or(|last| now.duration_since(last) >= self.interval)
    }

    async fn publish(&self, percent: u8, speed: f64) {
        info!(video_id = self.video_id, percent, speed, "Progress: {}% - Speed: {}x", percent, speed);

        if let Err(e) = self.channel.report(self.video_id, percent).await {
            warn!(video_id = self.video_id, "Failed to publish queue progress: {}", e);
        }
        if let Err(e) = self.videos.update_progress(self.video_id, percent).await {
            warn!(video_id = self.video_id, "Failed to store progress: {}", e);
        }
    }

    /// Consumes `stderr` until EOF.
    pub async fn run<R>(mut self, stderr: R) -> MonitorReport
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = FramedRead::new(stderr, StatusLineCodec);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut samples = 0;

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(video_id = self.video_id, "Encoder stderr read failed: {}", e);
                    break;
                }
            };

            let now = Instant::now();
            if self.due(now) {
                if let Some(sample) = ProgressSample::parse(&line) {
                    self.last_accepted = Some(now);
                    self.last_percent = self.last_percent.max(sample.percent(self.total_frames));
                    samples += 1;
                    self.publish(self.last_percent, sample.speed).await;
                }
            }

            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        MonitorReport {
            samples,
            last_percent: self.last_percent,
            stderr_tail: tail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingProgress, RecordingVideos, VideoUpdate};
    use futures_util::TryStreamExt;
    use tokio::io::AsyncWriteExt;

    async fn split(input: &[u8]) -> Vec<String> {
        FramedRead::new(input, StatusLineCodec)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn codec_splits_on_carriage_returns_and_newlines() {
        let lines = split(b"Input #0\nframe=  10 speed=1x\rframe=  20 speed=1.5x\r\n\nlast").await;
        assert_eq!(lines, ["Input #0", "frame=  10 speed=1x", "frame=  20 speed=1.5x", "last"]);
    }

    #[test]
    fn parses_latest_frame_and_speed() {
        let line = "frame=  120 fps= 60 q=25.0 size=N/A time=00:00:04.00 bitrate=N/A speed=2.01x";
        assert_eq!(ProgressSample::parse(line), Some(ProgressSample { frames: 120, speed: 2.01 }));

        let merged = "frame=1 speed=1x frame=  30 speed= 3.5x";
        assert_eq!(ProgressSample::parse(merged), Some(ProgressSample { frames: 30, speed: 3.5 }));
    }

    #[test]
    fn lines_without_both_fields_yield_no_sample() {
        assert_eq!(ProgressSample::parse("Stream mapping:"), None);
        assert_eq!(ProgressSample::parse("frame=  12 fps=0.0 speed=N/A"), None);
    }

    #[test]
    fn percent_is_rounded_and_clamped() {
        let sample = |frames| ProgressSample { frames, speed: 1.0 };
        assert_eq!(sample(0).percent(1800), 0);
        assert_eq!(sample(900).percent(1800), 50);
        assert_eq!(sample(1795).percent(1800), 100);
        assert_eq!(sample(1790).percent(1800), 99);
        assert_eq!(sample(2000).percent(1800), 100);
        assert_eq!(sample(10).percent(0), 0);
    }

    #[tokio::test]
    async fn reports_every_sample_without_throttle_and_never_decreases() {
        let channel = RecordingProgress::default();
        let videos = RecordingVideos::default();
        let stderr: &[u8] =
            b"frame=  900 speed=2x\rframe=  450 speed=2x\rnoise\rframe= 1800 speed=2x\n";

        let report = ProgressMonitor::new("v1", 1800, &channel, &videos)
            .with_interval(Duration::ZERO)
            .run(stderr)
            .await;

        assert_eq!(report.samples, 3);
        assert_eq!(report.last_percent, 100);
        assert_eq!(channel.reports(), [("v1".to_string(), 50), ("v1".to_string(), 50), ("v1".to_string(), 100)]);
        assert_eq!(
            videos.updates(),
            [
                VideoUpdate::Progress("v1".into(), 50),
                VideoUpdate::Progress("v1".into(), 50),
                VideoUpdate::Progress("v1".into(), 100),
            ]
        );
        assert_eq!(report.stderr_tail.len(), 4);
    }

    #[tokio::test]
    async fn throttle_accepts_first_sample_then_waits() {
        let channel = RecordingProgress::default();
        let videos = RecordingVideos::default();
        let stderr: &[u8] = b"frame= 100 speed=1x\rframe= 200 speed=1x\rframe= 300 speed=1x\r";

        let report = ProgressMonitor::new("v1", 1000, &channel, &videos).run(stderr).await;

        assert_eq!(report.samples, 1);
        assert_eq!(channel.reports(), [("v1".to_string(), 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_again_once_the_interval_has_passed() {
        let channel = RecordingProgress::default();
        let videos = RecordingVideos::default();
        let (mut writer, reader) = tokio::io::duplex(256);

        // 100 at 0s, 500 at 2.5s, 700 at 3.5s, 900 at 5s.
        tokio::spawn(async move {
            for (line, pause) in [
                (&b"frame= 100 speed=1x\r"[..], REPORT_INTERVAL),
                (b"frame= 500 speed=1x\r", Duration::from_secs(1)),
                (b"frame= 700 speed=1x\r", Duration::from_millis(1500)),
                (b"frame= 900 speed=1x\r", Duration::ZERO),
            ] {
                writer.write_all(line).await.unwrap();
                tokio::time::sleep(pause).await;
            }
        });

        let report = ProgressMonitor::new("v1", 1000, &channel, &videos).run(reader).await;

        assert_eq!(report.samples, 3);
        assert_eq!(
            channel.reports(),
            [("v1".to_string(), 10), ("v1".to_string(), 50), ("v1".to_string(), 90)]
        );
        assert_eq!(report.stderr_tail.len(), 4);
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        let channel = RecordingProgress::failing();
        let videos = RecordingVideos::failing();
        let stderr: &[u8] = b"frame= 500 speed=1x\n";

        let report = ProgressMonitor::new("v1", 1000, &channel, &videos)
            .with_interval(Duration::ZERO)
            .run(stderr)
            .await;

        assert_eq!(report.samples, 1);
        assert_eq!(report.last_percent, 50);
    }

    #[tokio::test]
    async fn tail_keeps_latest_lines() {
        let channel = RecordingProgress::default();
        let videos = RecordingVideos::default();
        let input: String = (0..30).map(|i| format!("line {i}\n")).collect();

        let report = ProgressMonitor::new("v1", 10, &channel, &videos)
            .run(input.as_bytes())
            .await;

        assert_eq!(report.stderr_tail.len(), STDERR_TAIL_LINES);
        assert_eq!(report.stderr_tail.first().unwrap(), "line 10");
        assert_eq!(report.stderr_tail.last().unwrap(), "line 29");
    }
}
