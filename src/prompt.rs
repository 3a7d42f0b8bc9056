//! The interactive question sequence each binary runs before downloading.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;

use crate::error::DownloadError;
use crate::yt_dlp_interface::formats::ContainerKind;

pub const DEFAULT_BITRATE: u32 = 128;

/// What is asked after the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterPrompt {
    None,
    Bitrate,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Default,
    /// kbit/s
    Bitrate(u32),
    Container(ContainerKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub selection: Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    AwaitUrl,
    AwaitParameter { url: String },
    Downloading(DownloadRequest),
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("input closed before a download was requested")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Empty means the default; otherwise a positive whole number of kbit/s.
pub fn parse_bitrate(input: &str) -> Result<u32, DownloadError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(DEFAULT_BITRATE);
    }
    let value: i64 = input
        .parse()
        .map_err(|_| DownloadError::InvalidParameter("Bitrate is not a number".to_string()))?;
    if value <= 0 {
        return Err(DownloadError::InvalidParameter("Bitrate must be greater than 0".to_string()));
    }
    u32::try_from(value).map_err(|_| DownloadError::InvalidParameter("Bitrate is too large".to_string()))
}

pub fn parse_container(input: &str) -> Result<ContainerKind, DownloadError> {
    input.parse()
}

fn invalid_message(err: &DownloadError) -> String {
    match err {
        DownloadError::InvalidParameter(message) | DownloadError::InvalidUrl(message) => message.clone(),
        other => other.to_string(),
    }
}

pub struct PromptFlow<R, W, V> {
    input: R,
    output: W,
    parameter: ParameterPrompt,
    validate: V,
    state: PromptState,
}

impl<R, W, V> PromptFlow<R, W, V>
where
    R: BufRead,
    W: Write,
    V: Fn(&str) -> bool,
{
    pub fn new(input: R, output: W, parameter: ParameterPrompt, validate: V) -> Self {
        Self {
            input,
            output,
            parameter,
            validate,
            state: PromptState::AwaitUrl,
        }
    }

    pub fn state(&self) -> &PromptState {
        &self.state
    }

    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.output, "{}", question.blue())?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Err(PromptError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Asks one question and moves to the next state; invalid answers keep
    /// the current state.
    pub fn step(&mut self) -> Result<(), PromptError> {
        let next = match self.state.clone() {
            PromptState::AwaitUrl => {
                let url = self.ask("[>] Video URL: ")?;
                let url = url.trim().to_string();
                if !(self.validate)(&url) {
                    writeln!(self.output, "[!] Invalid video URL.\nInput: {}", url)?;
                    return Ok(());
                }
                match self.parameter {
                    ParameterPrompt::None => PromptState::Downloading(DownloadRequest {
                        url,
                        selection: Selection::Default,
                    }),
                    _ => PromptState::AwaitParameter { url },
                }
            }
            PromptState::AwaitParameter { url } => {
                let parsed = match self.parameter {
                    ParameterPrompt::Bitrate => {
                        let answer = self.ask("[>] Audio Bitrate (default 128): ")?;
                        parse_bitrate(&answer).map(Selection::Bitrate).map_err(|e| (e, answer))
                    }
                    ParameterPrompt::Container => {
                        let answer = self.ask("[>] File type (flv/3gp/mp4/webm): ")?;
                        parse_container(&answer)
                            .map(Selection::Container)
                            .map_err(|_| (DownloadError::InvalidParameter("Invalid format".to_string()), answer))
                    }
                    ParameterPrompt::None => Ok(Selection::Default),
                };
                match parsed {
                    Ok(selection) => PromptState::Downloading(DownloadRequest { url, selection }),
                    Err((err, answer)) => {
                        let message = format!("[!] {}.\nInput: {}", invalid_message(&err), answer);
                        writeln!(self.output, "{}", message.red())?;
                        return Ok(());
                    }
                }
            }
            PromptState::Downloading(_) => return Ok(()),
        };
        self.state = next;
        Ok(())
    }

    /// Keeps asking until a download can start.
    pub fn run(mut self) -> Result<DownloadRequest, PromptError> {
        loop {
            if let PromptState::Downloading(request) = self.state {
                return Ok(request);
            }
            self.step()?;
        }
    }
}
