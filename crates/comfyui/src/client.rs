//! WebSocket client for the ComfyUI event stream.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A live WebSocket connection to the engine.
pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection configuration for one ComfyUI instance.
///
/// The client identity is not stored here: it is generated once per
/// process and threaded through every call so the streaming channel is
/// always scoped explicitly.
#[derive(Clone)]
pub struct ComfyUIClient {
    ws_url: String,
}

/// Errors establishing the WebSocket connection.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ComfyUIClient {
    /// Create a client targeting `ws_url` (e.g. `ws://host:8188`).
    pub fn new(ws_url: String) -> Self {
        Self {
            ws_url: ws_url.trim_end_matches('/').to_string(),
        }
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open the event stream, scoped to `client_id`.
    ///
    /// The engine addresses per-client messages by the `clientId`
    /// query parameter; all jobs in this process share one identity
    /// and disambiguate by prompt id.
    pub async fn connect(&self, client_id: &str) -> Result<WsStream, ComfyUIClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(client_id = %client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ws_stream)
    }
}
