pub mod merge;
pub mod mp3;
pub mod save;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use crossterm::style::Stylize;

use crate::config::{load_environment, Settings};
use crate::logging::init_logging;
use crate::prompt::{DownloadRequest, ParameterPrompt, PromptError, PromptFlow};
use crate::stream::StreamDownloader;
use crate::utils::{format_seconds, sanitize_filename};
use crate::yt_dlp_interface::{ensure_binaries, VideoMetadata, YoutubeFetcher};

pub use merge::convert_mkv;
pub use mp3::convert_mp3;
pub use save::download_video;

/// Everything a download needs once the tools are in place.
pub struct AppContext {
    pub settings: Settings,
    pub fetcher: YoutubeFetcher,
    pub streams: StreamDownloader,
    pub ffmpeg: PathBuf,
}

impl AppContext {
    pub async fn bootstrap(settings: Settings) -> Result<Self> {
        let toolchain = ensure_binaries(&settings).await?;
        tokio::fs::create_dir_all(&settings.output_dir).await?;
        let streams = StreamDownloader::new(settings.chunk_size, settings.stall_timeout)?;

        Ok(Self {
            fetcher: YoutubeFetcher::new(toolchain.yt_dlp),
            ffmpeg: toolchain.ffmpeg,
            streams,
            settings,
        })
    }

    /// Environment, logging and tools, in that order.
    pub async fn from_env() -> Result<Self> {
        let dotenv = load_environment()?;
        let settings = Settings::from_env()?;
        init_logging(settings.error_log.as_deref())?;
        match dotenv {
            Some(path) => log::info!("Loaded environment from {:?}", path),
            None => log::info!("No .env file found, using process environment"),
        }
        Self::bootstrap(settings).await
    }

    pub fn output_path(&self, title: &str, extension: &str) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}.{}", sanitize_filename(title), extension))
    }

    /// Runs the prompt on the terminal. `None` when input ends first.
    pub fn ask(&self, parameter: ParameterPrompt) -> Result<Option<DownloadRequest>> {
        let flow = PromptFlow::new(io::stdin().lock(), io::stdout(), parameter, |url: &str| {
            self.fetcher.validate_url(url)
        });
        match flow.run() {
            Ok(request) => Ok(Some(request)),
            Err(PromptError::Closed) => {
                log::info!("Input closed, nothing to download");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn detail_line<W: Write>(out: &mut W, label: &str, value: &str) -> io::Result<()> {
    writeln!(out, "{} {}", format!("[i] {:<15}:", label).blue(), value.yellow())
}

/// The header printed before every download.
pub fn print_video_details<W: Write>(
    out: &mut W,
    metadata: &VideoMetadata,
    extra: &[(&str, &str)],
) -> io::Result<()> {
    detail_line(out, "Title", &metadata.title)?;
    detail_line(out, "Uploader", &metadata.author)?;
    detail_line(out, "Length", &format_seconds(metadata.duration))?;
    for (label, value) in extra {
        detail_line(out, label, value)?;
    }
    writeln!(out)?;
    writeln!(out, "{}", "[i] Downloading...".blue())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_are_aligned() {
        let metadata = VideoMetadata {
            title: "Never Gonna Give You Up".to_string(),
            author: "Rick Astley".to_string(),
            duration: 212,
        };
        let mut out = Vec::new();
        print_video_details(&mut out, &metadata, &[("File Type", "mp4"), ("Quality", "720p")]).unwrap();
        let out = String::from_utf8(out).unwrap();

        for (label, value) in [
            ("[i] Title          :", "Never Gonna Give You Up"),
            ("[i] Uploader       :", "Rick Astley"),
            ("[i] Length         :", "03:32"),
            ("[i] File Type      :", "mp4"),
            ("[i] Quality        :", "720p"),
        ] {
            assert!(out.contains(label), "{}", label);
            assert!(out.contains(value), "{}", value);
        }
        assert!(out.contains("[i] Downloading..."));
    }
}
