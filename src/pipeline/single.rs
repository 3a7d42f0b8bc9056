use std::cell::Cell;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::time::{interval, MissedTickBehavior};

use crate::error::DownloadError;
use crate::panel::{ProgressLine, Summary};
use crate::pipeline::{explain_failure, remove_partial, PipelineOptions};
use crate::session::ProgressSample;
use crate::stream::{pump, MediaStream};
use crate::transcoder::{TranscodeCommand, Transcoder};

/// Where a single stream ends up.
pub enum SingleSink {
    /// Saved as is.
    File(PathBuf),
    /// Fed to the first input channel of `command`, which writes `output`.
    Transcoder { command: TranscodeCommand, output: PathBuf },
}

impl SingleSink {
    pub fn output(&self) -> &Path {
        match self {
            SingleSink::File(path) => path,
            SingleSink::Transcoder { output, .. } => output,
        }
    }
}

fn report<W: Write>(progress: &mut ProgressLine<W>, last_sample: &Cell<Instant>, sample: ProgressSample) {
    last_sample.set(Instant::now());
    if let Err(e) = progress.update(&sample) {
        log::debug!("Could not draw progress: {}", e);
    }
}

/// Drives `work` to completion, giving up once no sample has arrived for the
/// stall timeout.
async fn watched<T>(
    work: impl Future<Output = Result<T, DownloadError>>,
    options: &PipelineOptions,
    last_sample: &Cell<Instant>,
) -> Result<T, DownloadError> {
    let Some(limit) = options.stall_timeout else {
        return work.await;
    };
    tokio::pin!(work);
    let mut ticker = interval(options.render_interval.min(limit));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = &mut work => return result,
            _ = ticker.tick() => {
                if last_sample.get().elapsed() >= limit {
                    return Err(DownloadError::Stalled(limit));
                }
            }
        }
    }
}

pub async fn run<W: Write>(
    stream: MediaStream,
    sink: SingleSink,
    options: &PipelineOptions,
    progress: &mut ProgressLine<W>,
) -> Result<Summary, DownloadError> {
    let output = sink.output().to_path_buf();
    let result = match sink {
        SingleSink::File(path) => save(stream, &path, options, progress).await,
        SingleSink::Transcoder { command, .. } => transcode(stream, &command, options, progress).await,
    };

    if let Err(err) = result {
        log::error!("Download into {:?} failed: {}", output, err);
        remove_partial(&output).await;
        return Err(err);
    }

    let summary = Summary {
        elapsed: progress.started().elapsed(),
        output,
    };
    progress.finish(&summary)?;
    Ok(summary)
}

async fn save<W: Write>(
    stream: MediaStream,
    path: &Path,
    options: &PipelineOptions,
    progress: &mut ProgressLine<W>,
) -> Result<(), DownloadError> {
    let mut file = tokio::fs::File::create(path).await?;
    let last_sample = Cell::new(Instant::now());
    let pumped = pump(stream, &mut file, |sample| report(progress, &last_sample, sample));
    let written = watched(pumped, options, &last_sample).await?;
    log::debug!("Wrote {} bytes to {:?}", written, path);
    Ok(())
}

async fn transcode<W: Write>(
    stream: MediaStream,
    command: &TranscodeCommand,
    options: &PipelineOptions,
    progress: &mut ProgressLine<W>,
) -> Result<(), DownloadError> {
    let mut transcoder = Transcoder::spawn(command)?;
    let Some(mut input) = transcoder.take_input(0) else {
        transcoder.terminate().await;
        return Err(DownloadError::Internal("transcoder command has no input channel".to_string()));
    };

    let last_sample = Cell::new(Instant::now());
    let pumped = pump(stream, &mut input, |sample| report(progress, &last_sample, sample));
    let pumped = watched(pumped, options, &last_sample).await;
    // EOF for the transcoder
    drop(input);

    if let Err(err) = pumped {
        let err = explain_failure(err, &mut transcoder).await;
        transcoder.terminate().await;
        return Err(err);
    }

    let status = match options.stall_timeout {
        Some(limit) => match tokio::time::timeout(limit, transcoder.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                log::warn!("Transcoder did not exit within {:?} of the end of input", limit);
                transcoder.terminate().await;
                return Err(DownloadError::Stalled(limit));
            }
        },
        None => transcoder.wait().await?,
    };
    if !status.success() {
        return Err(DownloadError::TranscodeFailed { code: status.code() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamChunk;
    use crate::transcoder::args::SINGLE_INPUT_FD;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use std::time::Duration;
    use tempfile::TempDir;

    fn options() -> PipelineOptions {
        PipelineOptions {
            render_interval: Duration::from_millis(20),
            stall_timeout: Some(Duration::from_secs(10)),
        }
    }

    fn impatient() -> PipelineOptions {
        PipelineOptions {
            render_interval: Duration::from_millis(20),
            stall_timeout: Some(Duration::from_millis(200)),
        }
    }

    fn media(parts: &[&'static [u8]]) -> MediaStream {
        let total = parts.iter().map(|p| p.len() as u64).sum();
        let items: Vec<Result<StreamChunk, DownloadError>> = parts
            .iter()
            .map(|p| Ok(StreamChunk { bytes: Bytes::from_static(p), total }))
            .collect();
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_saves_stream_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Clip.mp4");
        let mut progress = ProgressLine::new(Vec::new());

        let summary = run(media(&[b"hello ", b"world"]), SingleSink::File(path.clone()), &options(), &mut progress)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
        assert_eq!(summary.output, path);
        let out = String::from_utf8(progress.into_inner()).unwrap();
        assert!(out.contains("100.0% "));
        assert!(out.contains("File saved as "));
        assert!(out.contains("Clip.mp4"));
    }

    #[tokio::test]
    async fn test_failed_download_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Clip.webm");
        let items = vec![
            Ok(StreamChunk { bytes: Bytes::from_static(b"partial"), total: 100 }),
            Err(DownloadError::Stream("connection reset".into())),
        ];
        let mut progress = ProgressLine::new(Vec::new());

        let err = run(stream::iter(items).boxed(), SingleSink::File(path.clone()), &options(), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Stream(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_feeds_transcoder_input() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("Song.mp3");
        let command = TranscodeCommand::new("sh")
            .args(["-c", r#"cat <&3 > "$1""#, "sh"])
            .arg(output.as_os_str())
            .input_channel(SINGLE_INPUT_FD);
        let mut progress = ProgressLine::new(Vec::new());

        let summary = run(
            media(&[b"ID3", b"frames"]),
            SingleSink::Transcoder { command, output: output.clone() },
            &options(),
            &mut progress,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"ID3frames");
        assert_eq!(summary.file_name(), "Song.mp3");
    }

    #[tokio::test]
    async fn test_transcoder_failure() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("Song.mp3");
        let command = TranscodeCommand::new("sh")
            .args(["-c", "exit 2"])
            .input_channel(SINGLE_INPUT_FD);
        let mut progress = ProgressLine::new(Vec::new());

        let err = run(
            media(&[b"ID3"]),
            SingleSink::Transcoder { command, output: output.clone() },
            &options(),
            &mut progress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::TranscodeFailed { code: Some(2) }), "{:?}", err);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_hung_transcoder_times_out() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("Song.mp3");
        let command = TranscodeCommand::new("sh")
            .args(["-c", "exec sleep 30"])
            .input_channel(SINGLE_INPUT_FD);
        let mut progress = ProgressLine::new(Vec::new());

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            run(
                media(&[b"ID3"]),
                SingleSink::Transcoder { command, output: output.clone() },
                &impatient(),
                &mut progress,
            ),
        )
        .await
        .expect("hung transcoder was not detected")
        .unwrap_err();

        assert!(matches!(err, DownloadError::Stalled(limit) if limit == Duration::from_millis(200)), "{:?}", err);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_silent_stream_times_out() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("Song.mp3");
        let command = TranscodeCommand::new("sh")
            .args(["-c", r#"cat <&3 > "$1""#, "sh"])
            .arg(output.as_os_str())
            .input_channel(SINGLE_INPUT_FD);
        let mut progress = ProgressLine::new(Vec::new());

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            run(
                stream::pending().boxed(),
                SingleSink::Transcoder { command, output: output.clone() },
                &impatient(),
                &mut progress,
            ),
        )
        .await
        .expect("silent stream was not detected")
        .unwrap_err();

        assert!(matches!(err, DownloadError::Stalled(_)), "{:?}", err);
        assert!(!output.exists());
    }
}
