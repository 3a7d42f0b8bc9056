use std::os::fd::RawFd;
use std::path::Path;

use super::spawn::TranscodeCommand;

pub const PROGRESS_FD: RawFd = 3;
pub const AUDIO_FD: RawFd = 4;
pub const VIDEO_FD: RawFd = 5;
/// The audio-only conversion has a single input and no progress channel.
pub const SINGLE_INPUT_FD: RawFd = 3;

fn pipe_url(fd: RawFd) -> String {
    format!("pipe:{}", fd)
}

/// Muxes audio from channel 4 and video from channel 5 into `output` without
/// re-encoding the video, reporting progress on channel 3.
pub fn merge_command(ffmpeg: &Path, output: &Path) -> TranscodeCommand {
    TranscodeCommand::new(ffmpeg)
        .args(["-loglevel", "8", "-hide_banner"])
        .arg("-progress")
        .arg(pipe_url(PROGRESS_FD))
        .arg("-i")
        .arg(pipe_url(AUDIO_FD))
        .arg("-i")
        .arg(pipe_url(VIDEO_FD))
        .args(["-map", "0:a", "-map", "1:v", "-c:v", "copy", "-y"])
        .arg(output.as_os_str())
        .progress_channel(PROGRESS_FD)
        .input_channel(AUDIO_FD)
        .input_channel(VIDEO_FD)
}

/// Encodes the audio arriving on channel 3 to an mp3 at `bitrate` kbit/s.
pub fn mp3_command(ffmpeg: &Path, bitrate: u32, output: &Path) -> TranscodeCommand {
    TranscodeCommand::new(ffmpeg)
        .args(["-loglevel", "8", "-hide_banner"])
        .arg("-i")
        .arg(pipe_url(SINGLE_INPUT_FD))
        .args(["-vn", "-codec:a", "libmp3lame"])
        .arg("-b:a")
        .arg(format!("{}k", bitrate))
        .args(["-f", "mp3", "-y"])
        .arg(output.as_os_str())
        .input_channel(SINGLE_INPUT_FD)
}
