use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tar::Archive;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use xz2::read::XzDecoder;

pub async fn download_file(url: &str, path: &Path) -> Result<()> {
    log::info!("Downloading from {} to {:?}", url, path);

    let client = reqwest::Client::new();
    let mut response = client.get(url).send().await.map_err(|e| {
        log::error!("Failed to send GET request to {}: {:?}", url, e);
        anyhow::anyhow!("Failed to send GET request to {}: {:?}", url, e)
    })?;

    if !response.status().is_success() {
        log::error!("Download failed for {}: HTTP status {}", url, response.status());
        return Err(anyhow::anyhow!("Download failed for {}: HTTP status {}", url, response.status()));
    }

    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create file {:?}", path))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("Failed to read chunk from response for {}", url))?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write chunk to file {:?}", path))?;
    }
    file.flush().await?;

    log::info!("Download completed successfully to {:?}", path);
    Ok(())
}

fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

/// Pulls the `ffmpeg` binary out of a static-build `.tar.xz` into
/// `extract_to/ffmpeg`.
pub fn extract_ffmpeg_tar_xz(archive_path: &Path, extract_to: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(extract_to)?;

    let file = File::open(archive_path).with_context(|| format!("Failed to open {:?}", archive_path))?;
    let mut archive = Archive::new(XzDecoder::new(file));
    let output_path = extract_to.join("ffmpeg");

    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_ffmpeg = entry.path()?.file_name().is_some_and(|name| name == "ffmpeg");
        if !is_ffmpeg || !entry.header().entry_type().is_file() {
            continue;
        }

        let mut outfile = File::create(&output_path)?;
        std::io::copy(&mut entry, &mut outfile)?;
        make_executable(&output_path)?;

        log::info!("Extracted ffmpeg to {:?}", output_path);
        return Ok(output_path);
    }

    anyhow::bail!("ffmpeg binary not found in {:?}", archive_path)
}

/// Unpacks a `.7z` release and moves its `ffmpeg` binary to
/// `extract_to/ffmpeg`.
pub fn extract_ffmpeg_7z(archive_path: &Path, extract_to: &Path) -> Result<PathBuf> {
    let staging = extract_to.join("ffmpeg-unpacked");
    std::fs::create_dir_all(&staging)?;

    sevenz_rust::decompress_file(archive_path, &staging)
        .map_err(|e| anyhow::anyhow!("Failed to extract 7z archive {:?}: {:?}", archive_path, e))?;

    let found = find_file_named(&staging, "ffmpeg")
        .with_context(|| format!("ffmpeg binary not found in {:?}", archive_path))?;
    let output_path = extract_to.join("ffmpeg");
    std::fs::copy(&found, &output_path)?;
    make_executable(&output_path)?;
    std::fs::remove_dir_all(&staging)?;

    log::info!("Extracted ffmpeg to {:?}", output_path);
    Ok(output_path)
}

fn find_file_named(base_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut stack = vec![base_dir.to_path_buf()];

    while let Some(current_dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().is_some_and(|n| n == name) {
                return Some(path);
            }
        }
    }

    None
}
