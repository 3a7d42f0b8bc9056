use std::io;

use anyhow::Result;

use crate::error::DownloadError;
use crate::handlers::{print_video_details, AppContext};
use crate::panel::{ProgressLine, Summary};
use crate::pipeline::single::{self, SingleSink};
use crate::pipeline::PipelineOptions;
use crate::prompt::{DownloadRequest, Selection};
use crate::yt_dlp_interface::{select, Quality};

/// Saves the best stream of the chosen container that has both audio and
/// video, without transcoding.
pub async fn download_video(ctx: &AppContext, request: &DownloadRequest) -> Result<Summary> {
    let Selection::Container(container) = request.selection else {
        return Err(DownloadError::InvalidParameter("a file type is required".to_string()).into());
    };

    let info = ctx.fetcher.fetch(&request.url).await?;
    let format = select(&info.formats, Quality::Progressive(container))?;
    log::info!("Saving format {} as {}", format.id, container);

    print_video_details(
        &mut io::stdout(),
        &info.metadata,
        &[("File Type", container.extension()), ("Quality", format.quality_label.as_str())],
    )?;

    let output = ctx.output_path(&info.metadata.title, container.extension());
    let mut progress = ProgressLine::new(io::stdout());
    let options = PipelineOptions::from(&ctx.settings);
    let summary = single::run(ctx.streams.open(format), SingleSink::File(output), &options, &mut progress).await?;
    Ok(summary)
}
