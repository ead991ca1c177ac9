//! Training dataset preparation
//!
//! Downloads the user-uploaded ZIP archive, extracts it into scratch
//! space, and locates the directory holding the training images. Some
//! uploads wrap the images in a single top-level folder; that layout is
//! flattened before handing the directory to the training script.

use pixgen_core::{PixgenError, PixgenResult};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Image file extensions accepted as training data
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Downloads and unpacks training archives
pub struct DatasetFetcher {
    client: reqwest::Client,
}

impl DatasetFetcher {
    /// Create a new fetcher with a bounded download timeout
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Download the archive at `zip_url`, extract it under `dest`, and
    /// return the directory containing the training images.
    pub async fn fetch(&self, zip_url: &str, dest: &Path) -> PixgenResult<PathBuf> {
        info!(url = %zip_url, "Downloading training images");

        let response = self
            .client
            .get(zip_url)
            .send()
            .await
            .map_err(|e| PixgenError::Dataset(format!("Failed to download archive: {}", e)))?
            .error_for_status()
            .map_err(|e| PixgenError::Dataset(format!("Archive download rejected: {}", e)))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PixgenError::Dataset(format!("Failed to read archive body: {}", e)))?;

        tokio::fs::create_dir_all(dest).await?;

        let dest_owned = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&bytes, &dest_owned))
            .await
            .map_err(|e| PixgenError::Internal(format!("Extraction task failed: {}", e)))??;

        let (img_dir, count) = locate_images(dest)?;
        info!(count, dir = %img_dir.display(), "Prepared training images");

        Ok(img_dir)
    }
}

impl Default for DatasetFetcher {
    fn default() -> Self {
        Self::new(120)
    }
}

/// Extract a ZIP archive from memory into `dest`
pub(crate) fn extract_archive(bytes: &[u8], dest: &Path) -> PixgenResult<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PixgenError::Dataset(format!("Invalid ZIP archive: {}", e)))?;
    archive
        .extract(dest)
        .map_err(|e| PixgenError::Dataset(format!("Failed to extract archive: {}", e)))
}

/// Find the image directory under an extracted archive root.
///
/// Fails when the archive contained no usable images.
pub(crate) fn locate_images(root: &Path) -> PixgenResult<(PathBuf, usize)> {
    let dir = resolve_image_dir(root)?;
    let count = count_images(&dir)?;

    if count == 0 {
        return Err(PixgenError::Dataset(
            "No training images found in the uploaded ZIP file".to_string(),
        ));
    }

    Ok((dir, count))
}

/// Flatten a single-subdirectory layout when the root has no images
fn resolve_image_dir(root: &Path) -> PixgenResult<PathBuf> {
    if count_images(root)? > 0 {
        return Ok(root.to_path_buf());
    }

    let subdirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    if subdirs.len() == 1 {
        return Ok(subdirs.into_iter().next().unwrap());
    }

    Ok(root.to_path_buf())
}

/// Count image files directly inside `dir`
fn count_images(dir: &Path) -> PixgenResult<usize> {
    let count = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_image(path))
        .count();
    Ok(count)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
