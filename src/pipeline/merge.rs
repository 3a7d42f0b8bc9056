use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::DownloadError;
use crate::panel::{Panel, Summary};
use crate::pipeline::{explain_failure, remove_partial, PipelineOptions};
use crate::session::{DownloadSession, StreamKind};
use crate::stream::{pump, MediaStream};
use crate::transcoder::{ProgressParser, TranscodeCommand, Transcoder};

/// Audio and video streams to be muxed into `output` by `command`, which must
/// declare a progress channel and two input channels (audio first).
pub struct MergeJob {
    pub command: TranscodeCommand,
    pub audio: MediaStream,
    pub video: MediaStream,
    pub output: PathBuf,
}

type TaskResult = Result<(), DownloadError>;

async fn transfer(
    kind: StreamKind,
    stream: MediaStream,
    mut sink: pipe::Sender,
    session: Arc<DownloadSession>,
) -> TaskResult {
    let written = pump(stream, &mut sink, |sample| session.record(kind, sample)).await?;
    log::debug!("{} stream finished after {} bytes", kind, written);
    Ok(())
}

async fn track_progress(channel: pipe::Receiver, session: Arc<DownloadSession>) -> TaskResult {
    let mut lines = BufReader::new(channel).lines();
    let mut parser = ProgressParser::default();
    while let Some(line) = lines.next_line().await? {
        if let Some(snapshot) = parser.feed_line(&line)? {
            session.record_merge(snapshot);
        }
    }
    log::debug!("Progress channel closed");
    Ok(())
}

fn joined(result: Result<TaskResult, tokio::task::JoinError>) -> TaskResult {
    result.map_err(|e| DownloadError::Internal(format!("pipeline task failed: {}", e)))?
}

/// Downloads both streams into the transcoder while repainting `panel`, and
/// returns once the muxed file is complete.
pub async fn run<P: Panel>(job: MergeJob, options: &PipelineOptions, panel: &mut P) -> Result<Summary, DownloadError> {
    let session = Arc::new(DownloadSession::new());
    let mut transcoder = Transcoder::spawn(&job.command)?;

    let missing = |what: &str| DownloadError::Internal(format!("transcoder command has no {} channel", what));
    let (progress, audio_in, video_in) = match (
        transcoder.take_progress(),
        transcoder.take_input(0),
        transcoder.take_input(1),
    ) {
        (Some(progress), Some(audio), Some(video)) => (progress, audio, video),
        (None, _, _) => return Err(abandon(missing("progress"), &mut transcoder).await),
        _ => return Err(abandon(missing("input"), &mut transcoder).await),
    };

    let mut tasks = JoinSet::new();
    tasks.spawn(transfer(StreamKind::Audio, job.audio, audio_in, Arc::clone(&session)));
    tasks.spawn(transfer(StreamKind::Video, job.video, video_in, Arc::clone(&session)));
    tasks.spawn(track_progress(progress, Arc::clone(&session)));

    if let Err(err) = drive(&mut transcoder, &mut tasks, &session, options, panel).await {
        let err = explain_failure(err, &mut transcoder).await;
        log::error!("Merge into {:?} failed: {}", job.output, err);
        transcoder.terminate().await;
        tasks.shutdown().await;
        remove_partial(&job.output).await;
        if let Err(e) = panel.abort() {
            log::debug!("Could not reset the panel: {}", e);
        }
        return Err(err);
    }

    panel.render(&session.snapshot())?;
    let summary = Summary {
        elapsed: session.elapsed(),
        output: job.output,
    };
    log::info!("Merged into {:?} in {:.3}s", summary.output, summary.elapsed.as_secs_f64());
    panel.finish(&summary)?;
    Ok(summary)
}

async fn abandon(err: DownloadError, transcoder: &mut Transcoder) -> DownloadError {
    transcoder.terminate().await;
    err
}

async fn drive<P: Panel>(
    transcoder: &mut Transcoder,
    tasks: &mut JoinSet<TaskResult>,
    session: &DownloadSession,
    options: &PipelineOptions,
    panel: &mut P,
) -> Result<(), DownloadError> {
    let mut ticker = interval(options.render_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status = loop {
        tokio::select! {
            status = transcoder.wait() => break status?,
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                joined(result)?;
                panel.render(&session.snapshot())?;
            }
            _ = ticker.tick() => {
                panel.render(&session.snapshot())?;
                check_stall(session, options)?;
            }
        }
    };

    if !status.success() {
        return Err(DownloadError::TranscodeFailed { code: status.code() });
    }
    log::debug!("Transcoder exited cleanly, joining remaining tasks");
    while !tasks.is_empty() {
        tokio::select! {
            Some(result) = tasks.join_next() => joined(result)?,
            _ = ticker.tick() => check_stall(session, options)?,
        }
    }
    Ok(())
}

fn check_stall(session: &DownloadSession, options: &PipelineOptions) -> Result<(), DownloadError> {
    match options.stall_timeout {
        Some(limit) if session.idle_for() >= limit => Err(DownloadError::Stalled(limit)),
        _ => Ok(()),
    }
}
