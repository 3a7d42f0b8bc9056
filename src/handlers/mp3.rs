use std::io;

use anyhow::Result;

use crate::handlers::{print_video_details, AppContext};
use crate::panel::{ProgressLine, Summary};
use crate::pipeline::single::{self, SingleSink};
use crate::pipeline::PipelineOptions;
use crate::prompt::{DownloadRequest, Selection, DEFAULT_BITRATE};
use crate::transcoder::mp3_command;
use crate::yt_dlp_interface::{select, Quality};

/// Best audio stream, encoded to mp3 at the requested bitrate.
pub async fn convert_mp3(ctx: &AppContext, request: &DownloadRequest) -> Result<Summary> {
    let bitrate = match request.selection {
        Selection::Bitrate(bitrate) => bitrate,
        _ => DEFAULT_BITRATE,
    };

    let info = ctx.fetcher.fetch(&request.url).await?;
    let format = select(&info.formats, Quality::HighestAudio)?;
    log::info!("Converting format {} to mp3 at {}k", format.id, bitrate);

    print_video_details(&mut io::stdout(), &info.metadata, &[])?;

    let output = ctx.output_path(&info.metadata.title, "mp3");
    let sink = SingleSink::Transcoder {
        command: mp3_command(&ctx.ffmpeg, bitrate, &output),
        output,
    };
    let mut progress = ProgressLine::new(io::stdout());
    let options = PipelineOptions::from(&ctx.settings);
    let summary = single::run(ctx.streams.open(format), sink, &options, &mut progress).await?;
    Ok(summary)
}
