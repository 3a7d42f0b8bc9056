//! ffmpeg's `-progress` protocol: blocks of `key=value` lines, each block
//! closed by a `progress=continue` or `progress=end` line.

use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("malformed progress line (missing '='): {0:?}")]
    MissingSeparator(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Continue,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeProgress {
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    /// Keys we do not interpret, kept as sent.
    pub extra: BTreeMap<String, String>,
    pub state: Option<ProgressState>,
}

impl Default for MergeProgress {
    fn default() -> Self {
        Self {
            frame: 0,
            fps: 0.0,
            speed: "0x".to_string(),
            extra: BTreeMap::new(),
            state: None,
        }
    }
}

impl MergeProgress {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), ProtocolError> {
        let invalid = || ProtocolError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "frame" => self.frame = value.parse().map_err(|_| invalid())?,
            "fps" => self.fps = parse_lenient_f64(value).ok_or_else(invalid)?,
            "speed" => self.speed = value.to_string(),
            "progress" => {
                self.state = Some(match value {
                    "continue" => ProgressState::Continue,
                    "end" => ProgressState::End,
                    _ => return Err(invalid()),
                })
            }
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

// ffmpeg reports "N/A" until it has a measurement
fn parse_lenient_f64(value: &str) -> Option<f64> {
    if value.eq_ignore_ascii_case("N/A") || value.is_empty() {
        return Some(0.0);
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accumulates lines until a block is complete.
#[derive(Debug, Default)]
pub struct ProgressParser {
    pending: MergeProgress,
}

impl ProgressParser {
    /// Feeds one line; returns the finished snapshot when `line` closes a block.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<MergeProgress>, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ProtocolError::MissingSeparator(line.to_string()))?;
        let key = key.trim();
        self.pending.apply(key, value.trim())?;

        if key == "progress" {
            // carry values over so a block that omits a key keeps the last one
            return Ok(Some(self.pending.clone()));
        }
        Ok(None)
    }

    /// Parses a whole chunk of newline separated lines, returning the last
    /// completed snapshot in it.
    pub fn feed_chunk(&mut self, chunk: &str) -> Result<Option<MergeProgress>, ProtocolError> {
        let mut latest = None;
        for line in chunk.lines() {
            if let Some(snapshot) = self.feed_line(line)? {
                latest = Some(snapshot);
            }
        }
        Ok(latest)
    }
}
