//! REST client for the ComfyUI HTTP endpoints.
//!
//! Wraps the engine's HTTP API (health probe, workflow submission,
//! history retrieval, output download) using [`reqwest`].

use std::time::Duration;

use serde::Deserialize;

/// Timeout applied to a single health probe request.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a single ComfyUI instance.
#[derive(Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the `/prompt` endpoint after a workflow is
/// queued successfully.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned correlation id for the queued workflow.
    pub prompt_id: String,
}

/// Errors from the ComfyUI REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApi {
    /// Create an API client for the engine at `api_url`
    /// (e.g. `http://host:8188`).
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Probe the engine root endpoint.
    ///
    /// Any successful status counts as healthy; the call is bounded by
    /// a short per-request timeout so the probe loop keeps its cadence.
    pub async fn health(&self) -> Result<(), ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/", self.api_url))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Queue a workflow for execution.
    ///
    /// Sends `POST /prompt` with `{"prompt": <graph>, "client_id": <id>}`
    /// and returns the engine-assigned `prompt_id` used to correlate
    /// streamed events and the history record.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve the execution history record for a prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. The returned JSON maps the
    /// prompt id to its outputs, including produced media file paths.
    pub async fn get_history(
        &self,
        prompt_id: &str,
    ) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download an output file through the engine's `/view` endpoint.
    ///
    /// The main collection path reads produced files from local disk;
    /// this is kept for deployments where the worker and engine do not
    /// share a filesystem.
    pub async fn get_view(
        &self,
        filename: &str,
        subfolder: &str,
        folder_type: &str,
    ) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", folder_type),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Return the response unchanged on a success status, or an
    /// [`ComfyUIApiError::Api`] carrying status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert a success status, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
