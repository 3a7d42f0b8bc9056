//! Drives downloads from the media streams to the file on disk.

pub mod merge;
pub mod single;

use std::path::Path;
use std::time::Duration;

use crate::config::Settings;
use crate::error::DownloadError;
use crate::transcoder::Transcoder;

pub use merge::MergeJob;
pub use single::SingleSink;

/// How long a transcoder that broke our pipe gets to report its exit status.
const EXIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub render_interval: Duration,
    /// `None` never gives up.
    pub stall_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            render_interval: crate::config::DEFAULT_RENDER_INTERVAL,
            stall_timeout: Some(crate::config::DEFAULT_STALL_TIMEOUT),
        }
    }
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            render_interval: settings.render_interval,
            stall_timeout: settings.stall_timeout,
        }
    }
}

pub(crate) async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::info!("Removed partial file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial file {:?}: {}", path, e),
    }
}

/// A write into a closed transcoder pipe usually means the transcoder died
/// first; report its exit status instead when it failed.
pub(crate) async fn explain_failure(err: DownloadError, transcoder: &mut Transcoder) -> DownloadError {
    if !err.is_broken_pipe() {
        return err;
    }
    match tokio::time::timeout(EXIT_GRACE, transcoder.wait()).await {
        Ok(Ok(status)) if !status.success() => DownloadError::TranscodeFailed { code: status.code() },
        _ => err,
    }
}
