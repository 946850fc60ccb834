//! HTTP and hashing utilities for helper tools.
//!
//! linuxdeployqt and appimagetool are fetched on demand when no local copy is
//! found; downloads and final artifacts are reported with their SHA-256.

use crate::bundler::error::{Error, ErrorExt, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Downloads a file from a URL.
///
/// Returns the file contents as a byte vector.
pub async fn download(url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading {}", url);

    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    Ok(bytes.to_vec())
}

/// Downloads `url` to `dest`, marks it executable and returns its SHA-256.
pub async fn download_tool(url: &str, dest: &Path) -> Result<String> {
    let data = download(url).await?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating tools directory", parent)?;
    }
    tokio::fs::write(dest, &data)
        .await
        .fs_context("writing downloaded tool", dest)?;
    super::fs::make_executable(dest).await?;

    let hash = sha256_bytes(data).await?;
    log::info!("✓ {} (sha256 {})", dest.display(), hash);
    Ok(hash)
}

/// SHA-256 of in-memory data, hex encoded.
///
/// Uses spawn_blocking to keep CPU-bound hashing off the async runtime.
pub async fn sha256_bytes(data: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || hex::encode(Sha256::digest(&data)))
        .await
        .map_err(|e| Error::Internal(format!("hashing task failed: {e}")))
}

/// SHA-256 of a file on disk, hex encoded.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<String> {
        let mut file = std::fs::File::open(&owned).fs_context("opening file for hashing", &owned)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).fs_context("hashing file", &owned)?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| Error::Internal(format!("hashing task failed: {e}")))?
}
