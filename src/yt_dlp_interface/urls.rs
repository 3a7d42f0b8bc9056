use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static pattern"));

const QUERY_HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "gaming.youtube.com",
];
const PATH_HOSTS: [&str; 4] = ["youtu.be", "youtube.com", "www.youtube.com", "youtube-nocookie.com"];
const PATH_PREFIXES: [&str; 4] = ["embed", "v", "shorts", "live"];

/// Extracts the 11 character video id from the URL shapes YouTube hands out.
pub fn video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();

    let candidate = if QUERY_HOSTS.contains(&host.as_str()) && parsed.path() == "/watch" {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    } else if PATH_HOSTS.contains(&host.as_str()) {
        let mut segments = parsed.path_segments()?;
        if host == "youtu.be" {
            segments.next().map(str::to_string)
        } else {
            match (segments.next(), segments.next()) {
                (Some(prefix), Some(id)) if PATH_PREFIXES.contains(&prefix) => Some(id.to_string()),
                _ => None,
            }
        }
    } else {
        None
    }?;

    VIDEO_ID.is_match(&candidate).then_some(candidate)
}

pub fn is_valid_video_url(url: &str) -> bool {
    video_id(url).is_some()
}

pub fn get_latest_yt_dlp_url() -> String {
    let asset = if cfg!(target_os = "linux") {
        if cfg!(target_arch = "aarch64") { "yt-dlp_linux_aarch64" } else { "yt-dlp_linux" }
    } else if cfg!(target_os = "macos") {
        "yt-dlp_macos"
    } else {
        "yt-dlp" // zipimport build, needs a python on PATH
    };

    format!("https://github.com/yt-dlp/yt-dlp/releases/latest/download/{}", asset)
}

pub fn get_latest_ffmpeg_url() -> String {
    if cfg!(target_os = "macos") {
        "https://evermeet.cx/ffmpeg/get/ffmpeg/7z".to_string()
    } else if cfg!(target_arch = "aarch64") {
        "https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-arm64-static.tar.xz".to_string()
    } else {
        "https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-amd64-static.tar.xz".to_string()
    }
}
