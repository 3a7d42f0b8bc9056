//! Media bytes from the hosting servers to wherever they are consumed.

pub mod http;
pub mod transfer;

pub use http::{MediaStream, StreamChunk, StreamDownloader};
pub use transfer::pump;
