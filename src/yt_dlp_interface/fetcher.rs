use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use tokio::process::Command;

use crate::error::DownloadError;
use crate::yt_dlp_interface::formats::{ContainerKind, FormatDescriptor};
use crate::yt_dlp_interface::urls::is_valid_video_url;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub author: String,
    /// seconds
    pub duration: u64,
}

#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub metadata: VideoMetadata,
    pub formats: Vec<FormatDescriptor>,
}

#[derive(Clone)]
pub struct YoutubeFetcher {
    pub yt_dlp_path: PathBuf,
}

impl YoutubeFetcher {
    pub fn new(yt_dlp_path: PathBuf) -> Self {
        YoutubeFetcher { yt_dlp_path }
    }

    pub fn validate_url(&self, url: &str) -> bool {
        is_valid_video_url(url)
    }

    /// Title, author, duration and the directly downloadable formats of `url`.
    pub async fn fetch(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        log::info!("Fetching metadata for {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .arg("--dump-single-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--skip-download")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DownloadError::FetchFailed(format!("failed to run {:?}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("yt-dlp failed for {} ({}): {}", url, output.status, stderr.trim());
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("yt-dlp failed")
                .trim()
                .to_string();
            return Err(DownloadError::FetchFailed(reason));
        }

        let info = parse_info(&output.stdout)?;
        log::info!(
            "Fetched {:?} by {:?}: {} usable formats",
            info.metadata.title,
            info.metadata.author,
            info.formats.len()
        );
        Ok(info)
    }
}

/// Durations come as numbers, fractional numbers or strings depending on the
/// extractor; anything unusable counts as 0.
fn de_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct SecondsVisitor;

    impl<'de> Visitor<'de> for SecondsVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number of seconds or a numeric string")
        }

        fn visit_u64<E>(self, v: u64) -> Result<u64, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<u64, E>
        where
            E: de::Error,
        {
            u64::try_from(v).map_err(|_| E::custom(format!("negative duration: {}", v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<u64, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v < 0.0 {
                return Err(E::custom(format!("invalid duration: {}", v)));
            }
            Ok(v.trunc() as u64)
        }

        fn visit_str<E>(self, v: &str) -> Result<u64, E>
        where
            E: de::Error,
        {
            let s = v.trim();
            if s.eq_ignore_ascii_case("N/A") || s.is_empty() {
                return Ok(0);
            }
            let seconds = s
                .parse::<f64>()
                .map_err(|e| E::custom(format!("invalid duration: {} ({})", v, e)))?;
            self.visit_f64(seconds)
        }

        fn visit_unit<E>(self) -> Result<u64, E>
        where
            E: de::Error,
        {
            Ok(0)
        }
    }

    deserializer.deserialize_any(SecondsVisitor)
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: String,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default, deserialize_with = "de_seconds")]
    duration: u64,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    format_note: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    tbr: Option<f64>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if c != "none")
}

impl RawFormat {
    // manifests and storyboards are not something we can stream over plain HTTP
    fn into_descriptor(self) -> Option<FormatDescriptor> {
        if !matches!(self.protocol.as_deref(), Some("https") | Some("http") | None) {
            return None;
        }
        let container = ContainerKind::from_extension(&self.ext)?;
        let url = self.url?;

        let has_video = has_codec(&self.vcodec);
        let has_audio = has_codec(&self.acodec);
        if !has_video && !has_audio {
            return None;
        }

        let quality_label = match (has_video, self.height) {
            (true, Some(height)) => format!("{}p", height),
            _ => self.format_note.clone().unwrap_or_default(),
        };
        let audio_quality = if has_audio {
            match (self.abr, self.format_note.as_deref()) {
                (Some(abr), Some(note)) if !has_video => format!("{} ({:.0}kbps)", note, abr),
                (Some(abr), _) => format!("{:.0}kbps", abr),
                (None, Some(note)) => note.to_string(),
                (None, None) => String::new(),
            }
        } else {
            String::new()
        };

        Some(FormatDescriptor {
            id: self.format_id,
            container,
            has_video,
            has_audio,
            quality_label,
            audio_quality,
            url,
            http_headers: self.http_headers,
            height: self.height,
            audio_bitrate: self.abr,
            total_bitrate: self.tbr,
            filesize: self.filesize,
        })
    }
}

pub fn parse_info(json: &[u8]) -> Result<VideoInfo, DownloadError> {
    let raw: RawInfo = serde_json::from_slice(json)
        .map_err(|e| DownloadError::FetchFailed(format!("unreadable yt-dlp output: {}", e)))?;

    let author = raw
        .uploader
        .or(raw.channel)
        .unwrap_or_else(|| "unknown".to_string());
    let formats = raw
        .formats
        .into_iter()
        .filter_map(RawFormat::into_descriptor)
        .collect();

    Ok(VideoInfo {
        metadata: VideoMetadata {
            title: raw.title,
            author,
            duration: raw.duration,
        },
        formats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "uploader": "Rick Astley",
        "duration": 212.0,
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "protocol": "mhtml", "url": "https://i.ytimg.com/sb", "vcodec": "none", "acodec": "none"},
            {"format_id": "hls-1", "ext": "mp4", "protocol": "m3u8_native", "url": "https://manifest", "vcodec": "avc1", "acodec": "mp4a"},
            {"format_id": "140", "ext": "m4a", "protocol": "https", "url": "https://rr.example/140", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.478, "tbr": 129.478, "format_note": "medium", "filesize": 3433514, "http_headers": {"User-Agent": "Mozilla/5.0"}},
            {"format_id": "18", "ext": "mp4", "protocol": "https", "url": "https://rr.example/18", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "tbr": 503.2, "format_note": "360p"},
            {"format_id": "137", "ext": "mp4", "protocol": "https", "url": "https://rr.example/137", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "tbr": 4000.1, "format_note": "1080p"},
            {"format_id": "999", "ext": "mkv", "protocol": "https", "url": "https://rr.example/999", "vcodec": "vp9", "acodec": "opus"}
        ]
    }"#;

    #[test]
    fn test_parse_info() {
        let info = parse_info(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            info.metadata,
            VideoMetadata {
                title: "Never Gonna Give You Up".to_string(),
                author: "Rick Astley".to_string(),
                duration: 212,
            }
        );

        let ids: Vec<_> = info.formats.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["140", "18", "137"]);

        let audio = &info.formats[0];
        assert_eq!(audio.container, ContainerKind::Mp4);
        assert!(audio.has_audio && !audio.has_video);
        assert_eq!(audio.audio_quality, "medium (129kbps)");
        assert_eq!(audio.filesize, Some(3433514));
        assert_eq!(audio.http_headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));

        let muxed = &info.formats[1];
        assert!(muxed.has_audio && muxed.has_video);
        assert_eq!(muxed.quality_label, "360p");

        let video = &info.formats[2];
        assert!(!video.has_audio && video.has_video);
        assert_eq!(video.quality_label, "1080p");
    }

    #[test]
    fn test_duration_shapes() {
        let cases = [
            (r#"{"title": "t", "duration": 61}"#, 61),
            (r#"{"title": "t", "duration": "3600"}"#, 3600),
            (r#"{"title": "t", "duration": "N/A"}"#, 0),
            (r#"{"title": "t", "duration": null}"#, 0),
            (r#"{"title": "t"}"#, 0),
        ];
        for (json, expected) in cases {
            let info = parse_info(json.as_bytes()).unwrap();
            assert_eq!(info.metadata.duration, expected, "{}", json);
            assert_eq!(info.metadata.author, "unknown");
        }
        assert!(parse_info(br#"{"title": "t", "duration": -5}"#).is_err());
    }

    #[test]
    fn test_channel_used_when_uploader_missing() {
        let info = parse_info(br#"{"title": "t", "channel": "Someone"}"#).unwrap();
        assert_eq!(info.metadata.author, "Someone");
    }

    #[test]
    fn test_garbage_is_fetch_failure() {
        assert!(matches!(parse_info(b"not json"), Err(DownloadError::FetchFailed(_))));
    }

    #[tokio::test]
    async fn test_fetch_reports_tool_failure() {
        // `false` exits 1 without output
        let fetcher = YoutubeFetcher::new(PathBuf::from("false"));
        let err = fetcher.fetch("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, DownloadError::FetchFailed(_)));

        let fetcher = YoutubeFetcher::new(PathBuf::from("/nonexistent/yt-dlp"));
        let err = fetcher.fetch("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, DownloadError::FetchFailed(_)));
    }
}
