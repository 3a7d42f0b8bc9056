//! The external transcoder (ffmpeg) and the pipes we talk to it through.

pub mod args;
pub mod progress;
pub mod spawn;

pub use args::{merge_command, mp3_command};
pub use progress::{MergeProgress, ProgressParser, ProtocolError};
pub use spawn::{TranscodeCommand, Transcoder};
