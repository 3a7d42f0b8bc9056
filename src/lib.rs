#[cfg(not(unix))]
compile_error!("ytconvert hands pipes to the transcoder by descriptor number and only builds on unix");

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod panel;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod stream;
pub mod transcoder;
pub mod utils;
pub mod yt_dlp_interface;

pub use error::DownloadError;
