//! Task request and callback payload definitions
//!
//! These types form the wire contract with the backend that dispatches
//! tasks and receives webhook callbacks. Field names are camelCase on
//! the wire to match that backend's serializer.

use serde::{Deserialize, Serialize};

use crate::{PixgenError, PixgenResult};

/// Request to fine-tune a LoRA adapter on user-uploaded images
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    /// URL of a ZIP archive containing the training images
    pub zip_url: String,
    /// Unique trigger word identifying the subject
    pub trigger_word: String,
    /// Opaque model identifier assigned by the backend
    pub model_id: String,
    /// Callback URL for the result webhook
    pub webhook_url: String,
}

/// Request to generate an image with a previously trained adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Text prompt, expected to contain the trigger word
    pub prompt: String,
    /// Model identifier whose LoRA weights to load
    pub model_id: String,
    /// Opaque image identifier assigned by the backend
    pub image_id: String,
    /// Callback URL for the result webhook
    pub webhook_url: String,
}

/// Terminal status of a task, as reported in callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Task completed and produced its artifact
    Generated,
    /// Task failed; the callback carries an error message
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Generated => write!(f, "Generated"),
            TaskStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Webhook payload reporting the outcome of a training task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainCallback {
    pub model_id: String,
    pub status: TaskStatus,
    /// Volume URI of the trained weights, empty on failure
    pub tensor_path: String,
    /// Public URL of the rendered thumbnail, empty when skipped or failed
    pub thumbnail_url: String,
    /// Error message, empty on success
    pub error: String,
}

impl TrainCallback {
    pub fn generated(model_id: String, tensor_path: String, thumbnail_url: String) -> Self {
        Self {
            model_id,
            status: TaskStatus::Generated,
            tensor_path,
            thumbnail_url,
            error: String::new(),
        }
    }

    pub fn failed(model_id: String, error: String) -> Self {
        Self {
            model_id,
            status: TaskStatus::Failed,
            tensor_path: String::new(),
            thumbnail_url: String::new(),
            error,
        }
    }
}

/// Webhook payload reporting the outcome of a generation task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCallback {
    pub image_id: String,
    pub status: TaskStatus,
    /// Public URL of the uploaded image, empty on failure
    pub image_url: String,
    /// Error message, empty on success
    pub error: String,
}

impl ImageCallback {
    pub fn generated(image_id: String, image_url: String) -> Self {
        Self {
            image_id,
            status: TaskStatus::Generated,
            image_url,
            error: String::new(),
        }
    }

    pub fn failed(image_id: String, error: String) -> Self {
        Self {
            image_id,
            status: TaskStatus::Failed,
            image_url: String::new(),
            error,
        }
    }
}

/// Validate an identifier before it is used as a volume path component.
///
/// Identifiers come from an external backend; anything that could
/// escape the per-model directory is rejected.
pub fn validate_identifier(id: &str) -> PixgenResult<()> {
    if id.is_empty() {
        return Err(PixgenError::InvalidIdentifier("empty identifier".to_string()));
    }
    if id == "." || id == ".." {
        return Err(PixgenError::InvalidIdentifier(id.to_string()));
    }
    if id.chars().any(|c| c == '/' || c == '\\' || c == '\0') {
        return Err(PixgenError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_request_wire_format() {
        let json = r#"{
            "zipUrl": "https://uploads.example.com/faces.zip",
            "triggerWord": "sks",
            "modelId": "3f8a1c2e",
            "webhookUrl": "https://api.example.com/webhook/train"
        }"#;
        let req: TrainRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.trigger_word, "sks");
        assert_eq!(req.model_id, "3f8a1c2e");
    }

    #[test]
    fn test_train_callback_serializes_camel_case() {
        let cb = TrainCallback::generated(
            "m1".to_string(),
            "volume://m1/pytorch_lora_weights.safetensors".to_string(),
            String::new(),
        );
        let json = serde_json::to_value(&cb).unwrap();
        assert_eq!(json["modelId"], "m1");
        assert_eq!(json["status"], "Generated");
        assert_eq!(json["tensorPath"], "volume://m1/pytorch_lora_weights.safetensors");
        assert_eq!(json["error"], "");
    }

    #[test]
    fn test_image_callback_failed() {
        let cb = ImageCallback::failed("img1".to_string(), "no weights".to_string());
        assert_eq!(cb.status, TaskStatus::Failed);
        assert!(cb.image_url.is_empty());
        let json = serde_json::to_value(&cb).unwrap();
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["error"], "no weights");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("3f8a1c2e-9b4d").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("..").is_err());
        assert!(validate_identifier("a/b").is_err());
        assert!(validate_identifier("a\\b").is_err());
    }

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Generated.to_string(), "Generated");
        assert_eq!(TaskStatus::Failed.to_string(), "Failed");
    }
}
