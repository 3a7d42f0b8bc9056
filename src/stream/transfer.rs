use futures::TryStreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::DownloadError;
use crate::session::ProgressSample;
use crate::stream::http::MediaStream;

/// Copies `stream` into `sink`, reporting after every chunk. Returns the
/// number of bytes written. The sink is shut down once the stream ends.
pub async fn pump<W, F>(mut stream: MediaStream, sink: &mut W, mut on_progress: F) -> Result<u64, DownloadError>
where
    W: AsyncWrite + Unpin,
    F: FnMut(ProgressSample),
{
    let mut downloaded = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        sink.write_all(&chunk.bytes).await.map_err(DownloadError::Sink)?;
        downloaded += chunk.bytes.len() as u64;
        on_progress(ProgressSample {
            downloaded,
            total: chunk.total,
        });
    }
    sink.shutdown().await.map_err(DownloadError::Sink)?;
    Ok(downloaded)
}
