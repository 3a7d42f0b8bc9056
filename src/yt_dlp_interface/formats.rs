use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Flv,
    ThreeGp,
    Mp4,
    Webm,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 4] = [ContainerKind::Flv, ContainerKind::ThreeGp, ContainerKind::Mp4, ContainerKind::Webm];

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerKind::Flv => "flv",
            ContainerKind::ThreeGp => "3gp",
            ContainerKind::Mp4 => "mp4",
            ContainerKind::Webm => "webm",
        }
    }

    /// Maps a yt-dlp `ext` onto the container it is stored in.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "flv" => Some(ContainerKind::Flv),
            "3gp" => Some(ContainerKind::ThreeGp),
            "mp4" | "m4a" | "m4v" => Some(ContainerKind::Mp4),
            "webm" | "weba" => Some(ContainerKind::Webm),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerKind {
    type Err = DownloadError;

    // strict: only the four tags a user may type
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        ContainerKind::ALL
            .into_iter()
            .find(|kind| kind.extension() == tag)
            .ok_or_else(|| DownloadError::InvalidParameter(format!("unknown file type {:?}", s)))
    }
}

/// One downloadable variant of a video.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    pub id: String,
    pub container: ContainerKind,
    pub has_video: bool,
    pub has_audio: bool,
    pub quality_label: String,
    pub audio_quality: String,
    pub url: String,
    pub http_headers: BTreeMap<String, String>,
    pub height: Option<u32>,
    /// kbit/s
    pub audio_bitrate: Option<f64>,
    /// kbit/s
    pub total_bitrate: Option<f64>,
    pub filesize: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    HighestAudio,
    HighestVideo,
    /// Best stream of this container carrying both audio and video.
    Progressive(ContainerKind),
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::HighestAudio => f.write_str("highest audio"),
            Quality::HighestVideo => f.write_str("highest video"),
            Quality::Progressive(container) => write!(f, "{} with audio and video", container),
        }
    }
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(0.0).total_cmp(&b.unwrap_or(0.0))
}

fn audio_rank(a: &FormatDescriptor, b: &FormatDescriptor) -> Ordering {
    cmp_f64(a.audio_bitrate, b.audio_bitrate)
        // a dedicated audio stream beats one muxed with video at the same bitrate
        .then_with(|| b.has_video.cmp(&a.has_video))
        .then_with(|| cmp_f64(a.total_bitrate, b.total_bitrate))
}

fn video_rank(a: &FormatDescriptor, b: &FormatDescriptor) -> Ordering {
    a.height
        .unwrap_or(0)
        .cmp(&b.height.unwrap_or(0))
        .then_with(|| b.has_audio.cmp(&a.has_audio))
        .then_with(|| cmp_f64(a.total_bitrate, b.total_bitrate))
}

fn progressive_rank(a: &FormatDescriptor, b: &FormatDescriptor) -> Ordering {
    a.height
        .unwrap_or(0)
        .cmp(&b.height.unwrap_or(0))
        .then_with(|| cmp_f64(a.total_bitrate, b.total_bitrate))
}

/// Picks the best format for `quality`.
pub fn select(formats: &[FormatDescriptor], quality: Quality) -> Result<&FormatDescriptor, DownloadError> {
    let best = match quality {
        Quality::HighestAudio => formats.iter().filter(|f| f.has_audio).max_by(|a, b| audio_rank(a, b)),
        Quality::HighestVideo => formats.iter().filter(|f| f.has_video).max_by(|a, b| video_rank(a, b)),
        Quality::Progressive(container) => formats
            .iter()
            .filter(|f| f.container == container && f.has_video && f.has_audio)
            .max_by(|a, b| progressive_rank(a, b)),
    };
    best.ok_or_else(|| DownloadError::NoMatchingFormat(quality.to_string()))
}
