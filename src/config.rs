use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

pub fn find_dotenv() -> Result<Option<PathBuf>> {
    let mut dirs = Vec::with_capacity(2);
    // 1. Check directory where the executable is located
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }
    // 2. Check current working directory
    dirs.push(std::env::current_dir()?);

    Ok(find_dotenv_in(dirs))
}

/// First `.env` among `dirs`, in order.
pub fn find_dotenv_in(dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.into_iter().map(|dir| dir.join(".env")).find(|path| path.exists())
}

/// Loads the `.env` file if there is one and returns where it came from.
/// Runs before logging is set up, so the caller reports the outcome.
pub fn load_environment() -> Result<Option<PathBuf>> {
    load_dotenv(find_dotenv()?)
}

fn load_dotenv(found: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match found {
        Some(path) => {
            dotenv::from_path(&path).with_context(|| format!("failed to load {:?}", path))?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Explicit yt-dlp binary; searched for when unset.
    pub yt_dlp_path: Option<PathBuf>,
    /// Explicit ffmpeg binary; searched for when unset.
    pub ffmpeg_path: Option<PathBuf>,
    pub libraries_dir: PathBuf,
    pub auto_install: bool,
    pub output_dir: PathBuf,
    pub render_interval: Duration,
    /// `None` waits forever.
    pub stall_timeout: Option<Duration>,
    pub chunk_size: u64,
    pub error_log: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            libraries_dir: PathBuf::from("lib"),
            auto_install: true,
            output_dir: PathBuf::from("."),
            render_interval: DEFAULT_RENDER_INTERVAL,
            stall_timeout: Some(DEFAULT_STALL_TIMEOUT),
            chunk_size: DEFAULT_CHUNK_SIZE,
            error_log: None,
        }
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got {:?}", name, value))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false, got {:?}", name, value),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source; unset or empty values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(path) = get("YTCONVERT_YT_DLP") {
            settings.yt_dlp_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("YTCONVERT_FFMPEG") {
            settings.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("YTCONVERT_LIB_DIR") {
            settings.libraries_dir = PathBuf::from(dir);
        }
        if let Some(value) = get("YTCONVERT_AUTO_INSTALL") {
            settings.auto_install = parse_bool("YTCONVERT_AUTO_INSTALL", &value)?;
        }
        if let Some(dir) = get("YTCONVERT_OUTPUT_DIR") {
            settings.output_dir = PathBuf::from(dir);
        }
        if let Some(value) = get("YTCONVERT_RENDER_INTERVAL_MS") {
            let millis = parse_u64("YTCONVERT_RENDER_INTERVAL_MS", &value)?;
            if millis == 0 {
                anyhow::bail!("YTCONVERT_RENDER_INTERVAL_MS must be greater than 0");
            }
            settings.render_interval = Duration::from_millis(millis);
        }
        if let Some(value) = get("YTCONVERT_STALL_TIMEOUT_SECS") {
            let secs = parse_u64("YTCONVERT_STALL_TIMEOUT_SECS", &value)?;
            settings.stall_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(value) = get("YTCONVERT_CHUNK_SIZE") {
            let size = parse_u64("YTCONVERT_CHUNK_SIZE", &value)?;
            if size == 0 {
                anyhow::bail!("YTCONVERT_CHUNK_SIZE must be greater than 0");
            }
            settings.chunk_size = size;
        }
        if let Some(path) = get("YTCONVERT_ERROR_LOG") {
            settings.error_log = Some(PathBuf::from(path));
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.render_interval, Duration::from_millis(100));
        assert_eq!(settings.stall_timeout, Some(Duration::from_secs(60)));
        assert_eq!(settings.chunk_size, 10 * 1024 * 1024);
        assert!(settings.auto_install);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("YTCONVERT_YT_DLP", "/opt/bin/yt-dlp"),
            ("YTCONVERT_FFMPEG", "/opt/bin/ffmpeg"),
            ("YTCONVERT_LIB_DIR", "/var/lib/ytconvert"),
            ("YTCONVERT_AUTO_INSTALL", "no"),
            ("YTCONVERT_OUTPUT_DIR", "/tmp/music"),
            ("YTCONVERT_RENDER_INTERVAL_MS", "250"),
            ("YTCONVERT_STALL_TIMEOUT_SECS", "0"),
            ("YTCONVERT_CHUNK_SIZE", "1048576"),
            ("YTCONVERT_ERROR_LOG", "errors.log"),
        ]))
        .unwrap();

        assert_eq!(settings.yt_dlp_path, Some(PathBuf::from("/opt/bin/yt-dlp")));
        assert_eq!(settings.ffmpeg_path, Some(PathBuf::from("/opt/bin/ffmpeg")));
        assert_eq!(settings.libraries_dir, PathBuf::from("/var/lib/ytconvert"));
        assert!(!settings.auto_install);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/music"));
        assert_eq!(settings.render_interval, Duration::from_millis(250));
        assert_eq!(settings.stall_timeout, None);
        assert_eq!(settings.chunk_size, 1_048_576);
        assert_eq!(settings.error_log, Some(PathBuf::from("errors.log")));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let settings = Settings::from_lookup(lookup(&[("YTCONVERT_OUTPUT_DIR", "  ")])).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_malformed_values_name_the_variable() {
        let err = Settings::from_lookup(lookup(&[("YTCONVERT_CHUNK_SIZE", "big")])).unwrap_err();
        assert!(err.to_string().contains("YTCONVERT_CHUNK_SIZE"));

        let err = Settings::from_lookup(lookup(&[("YTCONVERT_AUTO_INSTALL", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("YTCONVERT_AUTO_INSTALL"));

        assert!(Settings::from_lookup(lookup(&[("YTCONVERT_RENDER_INTERVAL_MS", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("YTCONVERT_CHUNK_SIZE", "0")])).is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("YTCONVERT_OUTPUT_DIR", "/tmp/from-env");
            std::env::set_var("YTCONVERT_STALL_TIMEOUT_SECS", "5");
        }
        let settings = Settings::from_env();
        unsafe {
            std::env::remove_var("YTCONVERT_OUTPUT_DIR");
            std::env::remove_var("YTCONVERT_STALL_TIMEOUT_SECS");
        }

        let settings = settings.unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/from-env"));
        assert_eq!(settings.stall_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_find_dotenv_prefers_earlier_dirs() {
        let first = tempfile::TempDir::new().unwrap();
        let second = tempfile::TempDir::new().unwrap();
        std::fs::write(second.path().join(".env"), "").unwrap();

        let dirs = || [first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(find_dotenv_in(dirs()), Some(second.path().join(".env")));

        std::fs::write(first.path().join(".env"), "").unwrap();
        assert_eq!(find_dotenv_in(dirs()), Some(first.path().join(".env")));
        assert_eq!(find_dotenv_in(Vec::new()), None);
    }

    #[test]
    #[serial]
    fn test_load_dotenv_sets_variables() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "YTCONVERT_TEST_MARKER=loaded\n").unwrap();

        let loaded = load_dotenv(find_dotenv_in([dir.path().to_path_buf()])).unwrap();
        assert_eq!(loaded, Some(dir.path().join(".env")));
        assert_eq!(std::env::var("YTCONVERT_TEST_MARKER").as_deref(), Ok("loaded"));
        unsafe {
            std::env::remove_var("YTCONVERT_TEST_MARKER");
        }
        assert_eq!(load_dotenv(None).unwrap(), None);
    }
}
