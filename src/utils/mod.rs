pub mod format;
pub mod retry;
pub mod sanitize;

pub use format::{format_bytes, format_seconds, format_seconds_str, to_fixed};
pub use sanitize::{sanitize, sanitize_filename};
