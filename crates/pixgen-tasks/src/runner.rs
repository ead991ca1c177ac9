//! Task orchestration
//!
//! Each task is a linear sequence of steps behind a single error
//! boundary: any failure becomes a `Failed` callback with the error
//! message, and the webhook is sent regardless of outcome.

use pixgen_core::{
    GenerateRequest, ImageCallback, PixgenResult, Secrets, TrainCallback, TrainRequest,
    WorkerConfig,
};
use pixgen_runtime::{
    DatasetFetcher, GenerateSpec, Generator, ScriptGenerator, ScriptTrainer, TrainSpec, Trainer,
};
use pixgen_store::{output_key, thumbnail_key, ObjectStore, WeightsVolume, WEIGHTS_FILE};
use pixgen_webhook::WebhookSender;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs train and generate tasks to completion
pub struct TaskRunner {
    trainer: Arc<dyn Trainer>,
    generator: Arc<dyn Generator>,
    volume: WeightsVolume,
    objects: ObjectStore,
    webhook: WebhookSender,
    fetcher: DatasetFetcher,
    scratch_path: PathBuf,
    render_thumbnail: bool,
}

impl TaskRunner {
    /// Create a runner backed by the external scripts
    pub fn new(config: &WorkerConfig, secrets: &Secrets) -> Self {
        let trainer = Arc::new(ScriptTrainer::new(
            config.scripts.clone(),
            config.training.clone(),
        ));
        let generator = Arc::new(ScriptGenerator::new(
            config.scripts.clone(),
            config.inference.clone(),
        ));
        Self::with_runtime(config, secrets, trainer, generator)
    }

    /// Create a runner with explicit trainer/generator implementations
    pub fn with_runtime(
        config: &WorkerConfig,
        secrets: &Secrets,
        trainer: Arc<dyn Trainer>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            trainer,
            generator,
            volume: WeightsVolume::new(config.volume.weights_path.clone()),
            objects: ObjectStore::new(&config.object_store, secrets),
            webhook: WebhookSender::new(&config.webhook, secrets.webhook_secret.as_bytes()),
            fetcher: DatasetFetcher::new(config.training.download_timeout_secs),
            scratch_path: config.volume.scratch_path.clone(),
            render_thumbnail: config.training.render_thumbnail,
        }
    }

    /// Run a training task and report the result
    pub async fn run_train(&self, req: TrainRequest) -> TrainCallback {
        let task_id = Uuid::new_v4();
        let started = chrono::Utc::now();
        info!(
            task_id = %task_id,
            model_id = %req.model_id,
            trigger_word = %req.trigger_word,
            trainer = self.trainer.name(),
            "Received training task"
        );

        let scratch = self.scratch_path.join(format!("train-{}", task_id));

        let callback = match self.train_inner(&req, &scratch).await {
            Ok((tensor_path, thumbnail_url)) => {
                TrainCallback::generated(req.model_id.clone(), tensor_path, thumbnail_url)
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Training task failed");
                TrainCallback::failed(req.model_id.clone(), e.to_string())
            }
        };

        self.cleanup(&scratch).await;
        self.deliver(&req.webhook_url, &callback, task_id).await;

        let elapsed = (chrono::Utc::now() - started).num_seconds();
        info!(
            task_id = %task_id,
            status = %callback.status,
            duration_secs = elapsed,
            "Training task finished"
        );

        callback
    }

    async fn train_inner(
        &self,
        req: &TrainRequest,
        scratch: &PathBuf,
    ) -> PixgenResult<(String, String)> {
        let image_dir = self
            .fetcher
            .fetch(&req.zip_url, &scratch.join("images"))
            .await?;

        let output_dir = self.volume.ensure_model_dir(&req.model_id).await?;

        let spec = TrainSpec {
            instance_data_dir: image_dir,
            output_dir,
            trigger_word: req.trigger_word.clone(),
        };
        self.trainer.train(&spec).await?;

        let weights = self.volume.find_weights(&req.model_id).await?;
        let file_name = weights
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(WEIGHTS_FILE);
        let tensor_path = WeightsVolume::tensor_uri(&req.model_id, file_name);

        let thumbnail_url = if self.render_thumbnail {
            self.render_thumbnail(req, &weights, scratch).await?
        } else {
            String::new()
        };

        Ok((tensor_path, thumbnail_url))
    }

    /// Render and upload a model thumbnail after training
    async fn render_thumbnail(
        &self,
        req: &TrainRequest,
        weights: &PathBuf,
        scratch: &PathBuf,
    ) -> PixgenResult<String> {
        let spec = GenerateSpec {
            lora_weights: weights.clone(),
            prompt: format!(
                "a professional headshot photo of {} person, studio lighting, neutral background",
                req.trigger_word
            ),
            output_path: scratch.join("thumbnail.png"),
        };
        let png = self.generator.generate(&spec).await?;
        self.objects
            .put(&thumbnail_key(&req.model_id), png, "image/png")
            .await
    }

    /// Run a generation task and report the result
    pub async fn run_generate(&self, req: GenerateRequest) -> ImageCallback {
        let task_id = Uuid::new_v4();
        let started = chrono::Utc::now();
        info!(
            task_id = %task_id,
            model_id = %req.model_id,
            image_id = %req.image_id,
            generator = self.generator.name(),
            "Received generation task"
        );

        let output_path = self.scratch_path.join(format!("generate-{}.png", task_id));

        let callback = match self.generate_inner(&req, &output_path).await {
            Ok(image_url) => ImageCallback::generated(req.image_id.clone(), image_url),
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Generation task failed");
                ImageCallback::failed(req.image_id.clone(), e.to_string())
            }
        };

        if let Err(e) = tokio::fs::remove_file(&output_path).await {
            debug!(error = %e, "No scratch image to remove");
        }
        self.deliver(&req.webhook_url, &callback, task_id).await;

        let elapsed = (chrono::Utc::now() - started).num_seconds();
        info!(
            task_id = %task_id,
            status = %callback.status,
            duration_secs = elapsed,
            "Generation task finished"
        );

        callback
    }

    async fn generate_inner(
        &self,
        req: &GenerateRequest,
        output_path: &PathBuf,
    ) -> PixgenResult<String> {
        let weights = self.volume.find_weights(&req.model_id).await?;

        tokio::fs::create_dir_all(&self.scratch_path).await?;

        let spec = GenerateSpec {
            lora_weights: weights,
            prompt: req.prompt.clone(),
            output_path: output_path.clone(),
        };
        let png = self.generator.generate(&spec).await?;

        self.objects
            .put(&output_key(&req.model_id, &req.image_id), png, "image/png")
            .await
    }

    /// Deliver a callback; delivery failure never changes task status
    async fn deliver<T: serde::Serialize>(&self, url: &str, callback: &T, task_id: Uuid) {
        if let Err(e) = self.webhook.send(url, callback).await {
            warn!(task_id = %task_id, error = %e, "Webhook delivery failed");
        }
    }

    async fn cleanup(&self, scratch: &PathBuf) {
        if let Err(e) = tokio::fs::remove_dir_all(scratch).await {
            debug!(path = %scratch.display(), error = %e, "No scratch directory to remove");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::Router;
    use pixgen_core::{PixgenError, TaskStatus};
    use std::io::Write;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    /// Trainer that writes a weights file like the real script would
    struct FakeTrainer;

    #[async_trait]
    impl Trainer for FakeTrainer {
        async fn train(&self, spec: &TrainSpec) -> PixgenResult<()> {
            // The script only ever sees a directory with images in it
            assert!(spec.instance_data_dir.join("a.jpg").exists());
            tokio::fs::write(spec.output_dir.join(WEIGHTS_FILE), b"weights").await?;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    /// Trainer that always fails
    struct FailingTrainer;

    #[async_trait]
    impl Trainer for FailingTrainer {
        async fn train(&self, _spec: &TrainSpec) -> PixgenResult<()> {
            Err(PixgenError::Training("exit code 1: CUDA out of memory".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct UnusedGenerator;

    #[async_trait]
    impl Generator for UnusedGenerator {
        async fn generate(&self, _spec: &GenerateSpec) -> PixgenResult<Vec<u8>> {
            panic!("generator should not run in this test");
        }

        fn name(&self) -> &'static str {
            "unused"
        }
    }

    /// Generator that renders a fixed PNG like the real script would
    struct PngGenerator;

    #[async_trait]
    impl Generator for PngGenerator {
        async fn generate(&self, spec: &GenerateSpec) -> PixgenResult<Vec<u8>> {
            assert!(spec.lora_weights.exists());
            Ok(b"\x89PNG fake image bytes".to_vec())
        }

        fn name(&self) -> &'static str {
            "png"
        }
    }

    /// Local stand-in for the backend and the object store
    #[derive(Default)]
    struct Backend {
        hooks: Mutex<Vec<Vec<u8>>>,
        uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    async fn hook(State(backend): State<Arc<Backend>>, body: Bytes) -> &'static str {
        backend.hooks.lock().unwrap().push(body.to_vec());
        "ok"
    }

    async fn upload(
        State(backend): State<Arc<Backend>>,
        axum::extract::Path((bucket, key)): axum::extract::Path<(String, String)>,
        body: Bytes,
    ) -> &'static str {
        backend
            .uploads
            .lock()
            .unwrap()
            .push((bucket, key, body.to_vec()));
        "ok"
    }

    fn training_zip() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default();
            writer.start_file("a.jpg", options).unwrap();
            writer.write_all(b"fake image").unwrap();
            writer.start_file("b.jpg", options).unwrap();
            writer.write_all(b"fake image").unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    /// Local server exposing the training archive, a webhook sink, and
    /// a path-style object-store endpoint
    async fn spawn_backend(backend: Arc<Backend>) -> SocketAddr {
        let router = Router::new()
            .route("/faces.zip", get(|| async { training_zip() }))
            .route("/hook", post(hook))
            .route("/:bucket/*key", axum::routing::put(upload))
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn test_runner(
        weights_dir: &std::path::Path,
        scratch_dir: &std::path::Path,
        s3_addr: SocketAddr,
        trainer: Arc<dyn Trainer>,
        generator: Arc<dyn Generator>,
    ) -> TaskRunner {
        let mut config = WorkerConfig::default();
        config.volume.weights_path = weights_dir.to_path_buf();
        config.volume.scratch_path = scratch_dir.to_path_buf();
        config.object_store.endpoint = format!("http://{}", s3_addr);
        config.object_store.bucket = "media".to_string();
        config.webhook.max_attempts = 1;
        config.webhook.backoff_secs = 0;
        config.webhook.timeout_secs = 2;

        let secrets = Secrets {
            s3_access_key: "key".to_string(),
            s3_secret_key: "secret".to_string(),
            webhook_secret: "test-secret".to_string(),
        };

        TaskRunner::with_runtime(&config, &secrets, trainer, generator)
    }

    #[tokio::test]
    async fn test_run_train_success() {
        let weights = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let backend = Arc::new(Backend::default());
        let addr = spawn_backend(backend.clone()).await;

        let runner = test_runner(
            weights.path(),
            scratch.path(),
            addr,
            Arc::new(FakeTrainer),
            Arc::new(UnusedGenerator),
        );
        let req = TrainRequest {
            zip_url: format!("http://{}/faces.zip", addr),
            trigger_word: "sks".to_string(),
            model_id: "m1".to_string(),
            webhook_url: format!("http://{}/hook", addr),
        };

        let callback = runner.run_train(req).await;

        assert_eq!(callback.status, TaskStatus::Generated);
        assert_eq!(callback.tensor_path, "volume://m1/pytorch_lora_weights.safetensors");
        assert!(callback.error.is_empty());
        assert!(weights.path().join("m1").join(WEIGHTS_FILE).exists());

        // Webhook carried the same payload
        let bodies = backend.hooks.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(parsed["modelId"], "m1");
        assert_eq!(parsed["status"], "Generated");
    }

    #[tokio::test]
    async fn test_run_train_failure_reports_failed() {
        let weights = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let backend = Arc::new(Backend::default());
        let addr = spawn_backend(backend.clone()).await;

        let runner = test_runner(
            weights.path(),
            scratch.path(),
            addr,
            Arc::new(FailingTrainer),
            Arc::new(UnusedGenerator),
        );
        let req = TrainRequest {
            zip_url: format!("http://{}/faces.zip", addr),
            trigger_word: "sks".to_string(),
            model_id: "m1".to_string(),
            webhook_url: format!("http://{}/hook", addr),
        };

        let callback = runner.run_train(req).await;

        assert_eq!(callback.status, TaskStatus::Failed);
        assert!(callback.tensor_path.is_empty());
        assert!(callback.error.contains("CUDA out of memory"));

        let bodies = backend.hooks.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(parsed["status"], "Failed");
    }

    #[tokio::test]
    async fn test_run_generate_success() {
        let weights = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let backend = Arc::new(Backend::default());
        let addr = spawn_backend(backend.clone()).await;

        // Weights from an earlier training run
        let model_dir = weights.path().join("m1");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join(WEIGHTS_FILE), b"weights").unwrap();

        let runner = test_runner(
            weights.path(),
            scratch.path(),
            addr,
            Arc::new(FakeTrainer),
            Arc::new(PngGenerator),
        );
        let req = GenerateRequest {
            prompt: "a headshot of sks person".to_string(),
            model_id: "m1".to_string(),
            image_id: "i1".to_string(),
            webhook_url: format!("http://{}/hook", addr),
        };

        let callback = runner.run_generate(req).await;

        let expected_url = format!("http://{}/media/outputs/m1/i1.png", addr);
        assert_eq!(callback.status, TaskStatus::Generated);
        assert_eq!(callback.image_url, expected_url);
        assert!(callback.error.is_empty());

        // The PNG landed in the bucket under the output key
        let uploads = backend.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (bucket, key, body) = &uploads[0];
        assert_eq!(bucket, "media");
        assert_eq!(key, "outputs/m1/i1.png");
        assert_eq!(body, b"\x89PNG fake image bytes");

        // Webhook carried the same payload
        let bodies = backend.hooks.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(parsed["imageId"], "i1");
        assert_eq!(parsed["status"], "Generated");
        assert_eq!(parsed["imageUrl"], expected_url.as_str());
    }

    #[tokio::test]
    async fn test_run_generate_missing_weights() {
        let weights = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let backend = Arc::new(Backend::default());
        let addr = spawn_backend(backend.clone()).await;

        let runner = test_runner(
            weights.path(),
            scratch.path(),
            addr,
            Arc::new(FakeTrainer),
            Arc::new(PngGenerator),
        );
        let req = GenerateRequest {
            prompt: "a headshot of sks person".to_string(),
            model_id: "never-trained".to_string(),
            image_id: "i1".to_string(),
            webhook_url: format!("http://{}/hook", addr),
        };

        let callback = runner.run_generate(req).await;

        assert_eq!(callback.status, TaskStatus::Failed);
        assert!(callback.error.contains("never-trained"));

        let bodies = backend.hooks.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(parsed["imageId"], "i1");
        assert_eq!(parsed["status"], "Failed");
    }
}
