//! Terminal progress output: the five line merge panel and the single line
//! download indicator.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::queue;
use crossterm::style::{Color, Print, Stylize};
use crossterm::terminal::{Clear, ClearType};

use crate::session::{ProgressSample, SessionSnapshot};
use crate::utils::{format_bytes, to_fixed};

/// Blank spacer line plus four status lines.
pub const PANEL_LINES: u16 = 5;

/// What a finished download reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub elapsed: Duration,
    pub output: PathBuf,
}

impl Summary {
    pub fn file_name(&self) -> String {
        self.output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output.display().to_string())
    }
}

pub fn write_summary<W: Write>(out: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(
        out,
        "{}{}",
        "[i] Download finished in ".blue(),
        format!("{:.3} seconds", summary.elapsed.as_secs_f64()).yellow()
    )?;
    writeln!(out, "{}{}", "[i] File saved as ".blue(), summary.file_name().yellow())?;
    out.flush()
}

/// Where the merge pipeline reports to.
pub trait Panel {
    fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()>;

    fn finish(&mut self, summary: &Summary) -> io::Result<()>;

    /// Leaves the output in a state where an error message can follow.
    fn abort(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn stream_line(label: &str, sample: &ProgressSample) -> String {
    format!(
        "[i] {} | {}% downloaded ({}/{}).",
        label,
        to_fixed(sample.percent(), 2),
        format_bytes(sample.downloaded, 1, true),
        format_bytes(sample.total, 1, true)
    )
}

/// The panel text, top to bottom, without the leading spacer.
pub fn panel_lines(snapshot: &SessionSnapshot) -> [String; 4] {
    [
        stream_line("Audio ", &snapshot.audio),
        stream_line("Video ", &snapshot.video),
        format!(
            "[i] Merged | processing frame {} (at {} fps => {}).",
            snapshot.merge.frame, snapshot.merge.fps, snapshot.merge.speed
        ),
        format!("[i] Time elapsed {:.3} seconds.", snapshot.elapsed.as_secs_f64()),
    ]
}

/// Repaints the panel in place by moving the cursor back up after each paint.
pub struct TerminalPanel<W: Write> {
    out: W,
    painted: bool,
}

impl<W: Write> TerminalPanel<W> {
    pub fn new(out: W) -> Self {
        Self { out, painted: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // cursor sits on the spacer line after a paint; step below the panel
    fn step_past(&mut self) -> io::Result<()> {
        if self.painted {
            for _ in 0..PANEL_LINES {
                writeln!(self.out)?;
            }
            self.painted = false;
        }
        Ok(())
    }
}

impl<W: Write> Panel for TerminalPanel<W> {
    fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        const COLORS: [Color; 4] = [Color::Red, Color::Cyan, Color::Yellow, Color::Blue];

        queue!(self.out, MoveToColumn(0), Clear(ClearType::UntilNewLine))?;
        writeln!(self.out)?;
        for (line, color) in panel_lines(snapshot).into_iter().zip(COLORS) {
            queue!(self.out, Print(line.with(color)), Clear(ClearType::UntilNewLine))?;
            writeln!(self.out)?;
        }
        queue!(self.out, MoveUp(PANEL_LINES))?;
        self.painted = true;
        self.out.flush()
    }

    fn finish(&mut self, summary: &Summary) -> io::Result<()> {
        self.step_past()?;
        write!(self.out, "\n\n\n")?;
        write_summary(&mut self.out, summary)
    }

    fn abort(&mut self) -> io::Result<()> {
        self.step_past()?;
        self.out.flush()
    }
}

/// For non-interactive output: the same information as log records, at most
/// once per `every`.
pub struct LogPanel {
    every: Duration,
    last: Option<Instant>,
}

impl LogPanel {
    pub fn new(every: Duration) -> Self {
        Self { every, last: None }
    }
}

impl Default for LogPanel {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl Panel for LogPanel {
    fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last {
            let both_done = snapshot.audio.is_complete() && snapshot.video.is_complete();
            if now.duration_since(last) < self.every && !both_done {
                return Ok(());
            }
        }
        self.last = Some(now);

        log::info!(
            "audio {}% ({}/{}) video {}% ({}/{}) frame {} fps {} speed {} elapsed {:.3}s",
            to_fixed(snapshot.audio.percent(), 2),
            snapshot.audio.downloaded,
            snapshot.audio.total,
            to_fixed(snapshot.video.percent(), 2),
            snapshot.video.downloaded,
            snapshot.video.total,
            snapshot.merge.frame,
            snapshot.merge.fps,
            snapshot.merge.speed,
            snapshot.elapsed.as_secs_f64()
        );
        Ok(())
    }

    fn finish(&mut self, summary: &Summary) -> io::Result<()> {
        log::info!(
            "Download finished in {:.3} seconds, saved as {:?}",
            summary.elapsed.as_secs_f64(),
            summary.output
        );
        write_summary(&mut io::stdout(), summary)
    }
}

/// Single line indicator rewritten with a carriage return on every update.
pub struct ProgressLine<W: Write> {
    out: W,
    started: Instant,
}

impl<W: Write> ProgressLine<W> {
    pub fn new(out: W) -> Self {
        Self { out, started: Instant::now() }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn update(&mut self, sample: &ProgressSample) -> io::Result<()> {
        write!(
            self.out,
            "{}{}{}{}{}{}\r",
            "[i] ".blue(),
            format!("{}% ", to_fixed(sample.percent(), 1)).green(),
            "Time elapsed: ".blue(),
            format!("{:.3} seconds ", self.started.elapsed().as_secs_f64()).yellow(),
            "Downloaded: ".blue(),
            format!(
                "{}/{}   ",
                format_bytes(sample.downloaded, 1, true),
                format_bytes(sample.total, 1, true)
            )
            .yellow()
        )?;
        self.out.flush()
    }

    pub fn finish(&mut self, summary: &Summary) -> io::Result<()> {
        writeln!(self.out)?;
        write_summary(&mut self.out, summary)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
