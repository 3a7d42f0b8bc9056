use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

use crate::config::Settings;
use crate::yt_dlp_interface::archive::{download_file, extract_ffmpeg_7z, extract_ffmpeg_tar_xz};
use crate::yt_dlp_interface::urls::{get_latest_ffmpeg_url, get_latest_yt_dlp_url};
use crate::yt_dlp_interface::utils::{find_in_path, is_executable_present};

/// Resolved locations of the external tools.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
}

/// Configured path first, then `PATH`, then the libraries directory.
pub fn locate(name: &str, configured: Option<&Path>, libraries_dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = configured {
        if is_executable_present(path) {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("configured {} at {:?} is missing or not executable", name, path);
    }

    if let Some(path) = find_in_path(name) {
        return Ok(Some(path));
    }

    let bundled = libraries_dir.join(name);
    Ok(is_executable_present(&bundled).then_some(bundled))
}

pub async fn ensure_binaries(settings: &Settings) -> Result<Toolchain> {
    let libraries_dir = &settings.libraries_dir;

    let yt_dlp = match locate("yt-dlp", settings.yt_dlp_path.as_deref(), libraries_dir)? {
        Some(path) => {
            log::info!("yt-dlp found at {:?}", path);
            path
        }
        None if settings.auto_install => install_yt_dlp(libraries_dir).await?,
        None => anyhow::bail!("yt-dlp not found and automatic installation is disabled"),
    };

    let ffmpeg = match locate("ffmpeg", settings.ffmpeg_path.as_deref(), libraries_dir)? {
        Some(path) => {
            log::info!("ffmpeg found at {:?}", path);
            path
        }
        None if settings.auto_install => install_ffmpeg(libraries_dir).await?,
        None => anyhow::bail!("ffmpeg not found and automatic installation is disabled"),
    };

    Ok(Toolchain { yt_dlp, ffmpeg })
}

async fn install_yt_dlp(libraries_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(libraries_dir).await?;
    let yt_dlp_path = libraries_dir.join("yt-dlp");

    log::info!("yt-dlp not found, downloading latest version...");
    download_file(&get_latest_yt_dlp_url(), &yt_dlp_path).await?;

    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(&yt_dlp_path).await?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&yt_dlp_path, perms).await?;

    Ok(yt_dlp_path)
}

async fn install_ffmpeg(libraries_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(libraries_dir).await?;
    log::info!("ffmpeg not found, downloading latest version...");

    let url = get_latest_ffmpeg_url();
    let seven_zip = url.ends_with("/7z");
    let archive_path = libraries_dir.join(if seven_zip { "ffmpeg-release.7z" } else { "ffmpeg-release.tar.xz" });
    download_file(&url, &archive_path).await?;

    let archive = archive_path.clone();
    let dest = libraries_dir.to_path_buf();
    let ffmpeg_path = tokio::task::spawn_blocking(move || {
        if seven_zip {
            extract_ffmpeg_7z(&archive, &dest)
        } else {
            extract_ffmpeg_tar_xz(&archive, &dest)
        }
    })
    .await
    .context("ffmpeg extraction task panicked")??;

    if let Err(e) = fs::remove_file(&archive_path).await {
        log::warn!("Could not remove {:?}: {}", archive_path, e);
    }
    Ok(ffmpeg_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn tool(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = TempDir::new().unwrap();
        let configured = tool(dir.path(), "my-yt-dlp");
        let found = locate("yt-dlp", Some(configured.as_path()), dir.path()).unwrap();
        assert_eq!(found, Some(configured));
    }

    #[test]
    fn test_broken_configured_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = locate("ffmpeg", Some(dir.path().join("nope").as_path()), dir.path()).unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn test_libraries_dir_fallback() {
        let dir = TempDir::new().unwrap();
        // a name no PATH entry will carry
        let name = "ytconvert-test-tool";
        assert_eq!(locate(name, None, dir.path()).unwrap(), None);

        let bundled = tool(dir.path(), name);
        assert_eq!(locate(name, None, dir.path()).unwrap(), Some(bundled));
    }

    #[tokio::test]
    async fn test_ensure_without_auto_install() {
        let dir = TempDir::new().unwrap();
        let yt_dlp = tool(dir.path(), "yt-dlp");
        let ffmpeg = tool(dir.path(), "ffmpeg");

        let settings = Settings {
            yt_dlp_path: Some(yt_dlp.clone()),
            ffmpeg_path: Some(ffmpeg.clone()),
            libraries_dir: dir.path().to_path_buf(),
            auto_install: false,
            ..Settings::default()
        };
        let toolchain = ensure_binaries(&settings).await.unwrap();
        assert_eq!(toolchain, Toolchain { yt_dlp, ffmpeg });
    }
}
