pub mod archive;
pub mod ensure;
pub mod fetcher;
pub mod formats;
pub mod urls;
pub mod utils;

pub use archive::download_file;
pub use ensure::{ensure_binaries, Toolchain};
pub use fetcher::{VideoInfo, VideoMetadata, YoutubeFetcher};
pub use formats::{select, ContainerKind, FormatDescriptor, Quality};
pub use urls::{is_valid_video_url, video_id};
pub use utils::is_executable_present;
