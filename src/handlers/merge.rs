use std::io::{self, IsTerminal};

use anyhow::Result;

use crate::handlers::{print_video_details, AppContext};
use crate::panel::{LogPanel, Summary, TerminalPanel};
use crate::pipeline::merge::{self, MergeJob};
use crate::pipeline::PipelineOptions;
use crate::prompt::DownloadRequest;
use crate::transcoder::merge_command;
use crate::yt_dlp_interface::{select, Quality};

/// Best audio and best video, muxed into a Matroska file.
pub async fn convert_mkv(ctx: &AppContext, request: &DownloadRequest) -> Result<Summary> {
    let info = ctx.fetcher.fetch(&request.url).await?;
    let audio = select(&info.formats, Quality::HighestAudio)?;
    let video = select(&info.formats, Quality::HighestVideo)?;
    log::info!("Merging audio format {} with video format {}", audio.id, video.id);

    print_video_details(
        &mut io::stdout(),
        &info.metadata,
        &[
            ("Audio Quality", audio.audio_quality.as_str()),
            ("Video Quality", video.quality_label.as_str()),
        ],
    )?;

    let output = ctx.output_path(&info.metadata.title, "mkv");
    let job = MergeJob {
        command: merge_command(&ctx.ffmpeg, &output),
        audio: ctx.streams.open(audio),
        video: ctx.streams.open(video),
        output,
    };
    let options = PipelineOptions::from(&ctx.settings);

    let summary = if io::stdout().is_terminal() {
        merge::run(job, &options, &mut TerminalPanel::new(io::stdout())).await?
    } else {
        merge::run(job, &options, &mut LogPanel::default()).await?
    };
    Ok(summary)
}
