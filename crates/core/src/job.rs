//! Job request/response types and request validation.
//!
//! A job arrives wrapped in the platform envelope `{"input": {...}}`;
//! the inner object deserializes into [`JobRequest`]. The worker
//! responds with either `{"video": <base64>}` or `{"error": <message>}`,
//! modeled by [`JobResponse`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default number of frames in the generated clip.
pub const DEFAULT_LENGTH: i64 = 81;

/// Default sampler step count.
pub const DEFAULT_STEPS: i64 = 10;

/// Default LoRA strength when a pair does not specify one.
pub const DEFAULT_LORA_WEIGHT: f64 = 1.0;

fn default_length() -> i64 {
    DEFAULT_LENGTH
}

fn default_steps() -> i64 {
    DEFAULT_STEPS
}

fn default_lora_weight() -> f64 {
    DEFAULT_LORA_WEIGHT
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A single high/low LoRA pair with independent strengths.
///
/// `high` and `low` are LoRA filenames as known to the engine. Either
/// side may be omitted; the composer skips unnamed sides.
#[derive(Debug, Clone, Deserialize)]
pub struct LoraPair {
    #[serde(default)]
    pub high: Option<String>,
    #[serde(default)]
    pub low: Option<String>,
    #[serde(default = "default_lora_weight")]
    pub high_weight: f64,
    #[serde(default = "default_lora_weight")]
    pub low_weight: f64,
}

/// An image-to-video generation job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    /// HTTP(S) URL or local filesystem path of the input image.
    /// Mutually exclusive with `image_base64`.
    #[serde(default)]
    pub image_path: Option<String>,
    /// Inline base64 image payload, optionally `data:` URI prefixed.
    /// Mutually exclusive with `image_path`.
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Positive text prompt.
    pub prompt: String,
    /// Noise seed for the sampler.
    pub seed: i64,
    /// Classifier-free guidance scale.
    pub cfg: f64,
    pub width: i64,
    pub height: i64,
    /// Frame count (default 81).
    #[serde(default = "default_length")]
    pub length: i64,
    /// Sampler step count (default 10).
    #[serde(default = "default_steps")]
    pub steps: i64,
    /// Up to three LoRA pairs; extra pairs are clamped off with a warning.
    #[serde(default)]
    pub lora_pairs: Vec<LoraPair>,
}

/// The resolved image source after validating mutual exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// URL or local filesystem path.
    Path(&'a str),
    /// Inline base64 payload.
    Base64(&'a str),
}

impl JobRequest {
    /// Resolve which image source this job carries.
    ///
    /// Exactly one of `image_path` / `image_base64` must be present and
    /// non-empty. Empty strings count as absent, matching how callers
    /// tend to template these fields.
    pub fn image_source(&self) -> Result<ImageSource<'_>, CoreError> {
        let path = self.image_path.as_deref().filter(|s| !s.is_empty());
        let b64 = self.image_base64.as_deref().filter(|s| !s.is_empty());

        match (path, b64) {
            (None, None) => Err(CoreError::Validation(
                "Either image_path or image_base64 is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(CoreError::Validation(
                "Please provide either image_path or image_base64, not both".to_string(),
            )),
            (Some(p), None) => Ok(ImageSource::Path(p)),
            (None, Some(b)) => Ok(ImageSource::Base64(b)),
        }
    }
}

// ---------------------------------------------------------------------------
// Response type
// ---------------------------------------------------------------------------

/// Worker response: a produced video or a structured error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JobResponse {
    Video {
        /// Base64-encoded video bytes.
        video: String,
    },
    Error {
        /// Human-readable failure description.
        error: String,
    },
}

impl JobResponse {
    pub fn error(message: impl Into<String>) -> Self {
        JobResponse::Error {
            error: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Generate a fresh task identity.
///
/// The identity namespaces the saved input file and correlates log
/// lines for one job; it is never reused.
pub fn new_task_id() -> String {
    format!("task_{}", uuid::Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
