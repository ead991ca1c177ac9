//! S3-compatible object storage
//!
//! Generated images (and optional thumbnails) are uploaded to an
//! S3-compatible store behind a custom endpoint. Uploads are addressed
//! path-style so the same code works against R2/MinIO.

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use pixgen_core::{ObjectStoreConfig, PixgenError, PixgenResult, Secrets};
use tracing::info;

/// Object store client for generated images
pub struct ObjectStore {
    client: aws_sdk_s3::Client,
    endpoint: String,
    bucket: String,
}

impl ObjectStore {
    /// Create a client from config and environment secrets
    pub fn new(config: &ObjectStoreConfig, secrets: &Secrets) -> Self {
        let credentials = Credentials::new(
            secrets.s3_access_key.clone(),
            secrets.s3_secret_key.clone(),
            None,
            None,
            "pixgen",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
        }
    }

    /// Upload bytes under `key` and return the public URL
    pub async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> PixgenResult<String> {
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| PixgenError::Storage(format!("Failed to upload {}: {}", key, e)))?;

        let url = self.public_url(key);
        info!(key, size_bytes = size, url = %url, "Uploaded object");
        Ok(url)
    }

    /// Public URL of an object in this bucket
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

/// Key for a generated output image
pub fn output_key(model_id: &str, image_id: &str) -> String {
    format!("outputs/{}/{}.png", model_id, image_id)
}

/// Key for a model thumbnail
pub fn thumbnail_key(model_id: &str) -> String {
    format!("thumbnails/{}.png", model_id)
}
