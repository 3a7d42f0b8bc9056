use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Record};

fn format_line(record: &Record) -> String {
    format!(
        "{} [{}] {}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Console logging at `warn` unless `RUST_LOG` says otherwise, so the
/// progress output stays readable. Error records are also appended to
/// `error_log` when given.
pub fn init_logging(error_log: Option<&Path>) -> Result<()> {
    let error_log_file = match error_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open error log {:?}", path))?;
            Some(Arc::new(Mutex::new(file)))
        }
        None => None,
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .format(move |buf, record| {
            let output = format_line(record);

            if record.level() == Level::Error {
                if let Some(file) = &error_log_file {
                    if let Ok(mut file) = file.try_lock() {
                        let _ = writeln!(file, "{}", &output);
                    }
                }
            }

            writeln!(buf, "{}", &output)
        })
        .filter(None, LevelFilter::Warn);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.try_init().context("logger already initialized")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_line_layout() {
        let line = format_line(
            &Record::builder()
                .level(Level::Warn)
                .target("ytconvert::pipeline")
                .args(format_args!("slow transcoder"))
                .build(),
        );
        let (timestamp, rest) = line.split_at(19);
        assert_eq!(timestamp.len(), "2024-01-01 00:00:00".len());
        assert_eq!(rest, " [WARN] ytconvert::pipeline: slow transcoder");
    }

    #[test]
    fn test_errors_reach_the_error_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("errors.log");
        init_logging(Some(&path)).unwrap();

        log::error!("transcoder vanished");
        log::warn!("only on the console");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[ERROR]"));
        assert!(contents.contains("transcoder vanished"));
        assert!(!contents.contains("only on the console"));

        // the global logger can only be installed once
        assert!(init_logging(None).is_err());
    }
}
