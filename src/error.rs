use std::io;
use std::time::Duration;

use crate::transcoder::progress::ProtocolError;

/// Everything that can go wrong between the prompt and the saved file.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to fetch video metadata: {0}")]
    FetchFailed(String),

    #[error("no format matches {0}")]
    NoMatchingFormat(String),

    #[error("transcoder exited unsuccessfully (exit code {})", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    TranscodeFailed { code: Option<i32> },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("failed to write media bytes: {0}")]
    Sink(#[source] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no progress for {0:?}, giving up")]
    Stalled(Duration),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DownloadError {
    /// The transcoder went away while we were still feeding it.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, DownloadError::Sink(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}
