//! Bitrate ladder planning: which renditions a source is encoded into.

use super::probe::MediaProbeResult;

/// GOP length in seconds; segments start on a keyframe every two seconds.
const GOP_SECONDS: f64 = 2.0;

/// Narrowest source that still yields two distinct even widths.
pub const MIN_SOURCE_WIDTH: u32 = 4;

#[derive(Debug, Clone, Copy)]
struct Rung {
    width: u32,
    video_kbps: u32,
    audio_kbps: u32,
}

struct Tier {
    min_width: u32,
    rungs: &'static [Rung],
}

const fn rung(width: u32, video_kbps: u32, audio_kbps: u32) -> Rung {
    Rung {
        width,
        video_kbps,
        audio_kbps,
    }
}

/// Ordered from the widest tier down; the last tier catches everything.
const TIERS: &[Tier] = &[
    Tier {
        min_width: 3840,
        rungs: &[
            rung(3840, 12_000, 256),
            rung(1920, 6_000, 256),
            rung(1280, 3_000, 128),
            rung(640, 1_000, 128),
        ],
    },
    Tier {
        min_width: 1920,
        rungs: &[
            rung(1920, 6_000, 256),
            rung(1280, 3_000, 128),
            rung(640, 1_000, 128),
        ],
    },
    Tier {
        min_width: 0,
        rungs: &[rung(1280, 3_000, 128), rung(640, 1_000, 128)],
    },
];

/// Encoder parameters every rendition shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub preset: &'static str,
    pub look_ahead: bool,
    pub profile: &'static str,
    pub closed_gop: bool,
    pub gop_length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub width: u32,
    pub video_kbps: u32,
    pub audio_codec: &'static str,
    pub audio_kbps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ladder {
    pub renditions: Vec<Rendition>,
    pub encoder: EncoderSettings,
}

impl Ladder {
    pub fn len(&self) -> usize {
        self.renditions.len()
    }
}

/// ffmpeg bitrate notation: whole megabits as `M`, the rest as `k`.
pub fn format_kbps(kbps: u32) -> String {
    if kbps >= 1000 && kbps % 1000 == 0 {
        format!("{}M", kbps / 1000)
    } else {
        format!("{}k", kbps)
    }
}

/// At least one frame per GOP, even for sub-0.5 fps sources.
pub fn gop_length(frame_count: u64, duration: f64) -> u32 {
    ((GOP_SECONDS * frame_count as f64 / duration).round() as u32).max(1)
}

/// Picks the ladder for a probed source. Rendition widths never exceed the
/// source width (rounded down to even, as the encoder requires) and strictly
/// decrease: a rung that would repeat the previous width gets half of it.
pub fn plan_ladder(probe: &MediaProbeResult) -> Ladder {
    let tier = TIERS
        .iter()
        .find(|t| probe.width >= t.min_width)
        .unwrap_or(&TIERS[TIERS.len() - 1]);

    let max_width = probe.width & !1;

    let mut renditions: Vec<Rendition> = Vec::with_capacity(tier.rungs.len());
    for r in tier.rungs {
        let mut width = r.width.min(max_width);
        if let Some(previous) = renditions.last() {
            if width >= previous.width {
                width = (previous.width / 2) & !1;
            }
        }
        renditions.push(Rendition {
            width,
            video_kbps: r.video_kbps,
            audio_codec: "aac",
            audio_kbps: r.audio_kbps,
        });
    }

    Ladder {
        renditions,
        encoder: EncoderSettings {
            preset: "faster",
            look_ahead: true,
            profile: "main",
            closed_gop: true,
            gop_length: gop_length(probe.frame_count, probe.duration),
        },
    }
}
