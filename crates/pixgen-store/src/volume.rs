//! Shared weights volume
//!
//! The volume holds one directory per model id. A training run writes
//! its LoRA weights there once; every later generation run for that
//! model reads them. Nothing here updates or deletes an artifact.

use pixgen_core::{PixgenError, PixgenResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Canonical output file name of the training script
pub const WEIGHTS_FILE: &str = "pytorch_lora_weights.safetensors";

/// URI scheme recorded in train callbacks
const VOLUME_SCHEME: &str = "volume://";

/// Weights volume layout
#[derive(Debug, Clone)]
pub struct WeightsVolume {
    base_path: PathBuf,
}

impl WeightsVolume {
    /// Create a volume rooted at `base_path`
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Directory holding the weights for a model
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.base_path.join(model_id)
    }

    /// Create the model directory if it does not exist
    pub async fn ensure_model_dir(&self, model_id: &str) -> PixgenResult<PathBuf> {
        let dir = self.model_dir(model_id);
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await?;
            info!(path = %dir.display(), "Created model directory");
        }
        Ok(dir)
    }

    /// Locate the weights file for a model.
    ///
    /// Prefers the canonical file name; falls back to any
    /// `.safetensors` file the training script may have produced.
    pub async fn find_weights(&self, model_id: &str) -> PixgenResult<PathBuf> {
        let dir = self.model_dir(model_id);

        let canonical = dir.join(WEIGHTS_FILE);
        if canonical.exists() {
            return Ok(canonical);
        }

        if let Some(alt) = find_safetensors(&dir).await? {
            debug!(path = %alt.display(), "Using fallback weights file");
            return Ok(alt);
        }

        Err(PixgenError::WeightsNotFound(format!(
            "No LoRA weights found for model {}. Expected at {}",
            model_id,
            canonical.display()
        )))
    }

    /// Volume URI recorded in the train callback
    pub fn tensor_uri(model_id: &str, file_name: &str) -> String {
        format!("{}{}/{}", VOLUME_SCHEME, model_id, file_name)
    }
}

async fn find_safetensors(dir: &Path) -> PixgenResult<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map_or(false, |e| e == "safetensors") {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_weights_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let volume = WeightsVolume::new(dir.path().to_path_buf());

        let model_dir = volume.ensure_model_dir("m1").await.unwrap();
        tokio::fs::write(model_dir.join(WEIGHTS_FILE), b"weights").await.unwrap();
        tokio::fs::write(model_dir.join("other.safetensors"), b"other").await.unwrap();

        let found = volume.find_weights("m1").await.unwrap();
        assert_eq!(found, model_dir.join(WEIGHTS_FILE));
    }

    #[tokio::test]
    async fn test_find_weights_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let volume = WeightsVolume::new(dir.path().to_path_buf());

        let model_dir = volume.ensure_model_dir("m1").await.unwrap();
        tokio::fs::write(model_dir.join("checkpoint.safetensors"), b"weights")
            .await
            .unwrap();

        let found = volume.find_weights("m1").await.unwrap();
        assert_eq!(found, model_dir.join("checkpoint.safetensors"));
    }

    #[tokio::test]
    async fn test_find_weights_missing() {
        let dir = tempfile::tempdir().unwrap();
        let volume = WeightsVolume::new(dir.path().to_path_buf());

        let err = volume.find_weights("missing").await.unwrap_err();
        assert!(matches!(err, PixgenError::WeightsNotFound(_)));
    }

    #[test]
    fn test_tensor_uri() {
        assert_eq!(
            WeightsVolume::tensor_uri("m1", WEIGHTS_FILE),
            "volume://m1/pytorch_lora_weights.safetensors"
        );
    }
}
