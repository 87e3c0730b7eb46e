use std::sync::Arc;

use wanvid_comfyui::api::ComfyUIApi;
use wanvid_comfyui::client::ComfyUIClient;

use crate::config::WorkerConfig;

/// Shared state available to all intake handlers.
///
/// Cheaply cloneable. The client identity is generated once at process
/// start and threaded through here -- it scopes the engine's event
/// stream to this process for its whole lifetime, while individual
/// jobs are told apart by prompt id.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WorkerConfig>,
    /// Process-wide engine client identity.
    pub client_id: Arc<str>,
    /// REST client for the engine.
    pub api: ComfyUIApi,
    /// WebSocket client for the engine's event stream.
    pub client: ComfyUIClient,
}

impl AppState {
    /// Build state for one engine host, deriving both engine URLs.
    pub fn new(config: WorkerConfig, client_id: String) -> Self {
        let api = ComfyUIApi::new(wanvid_comfyui::api_url(&config.engine_host));
        let client = ComfyUIClient::new(wanvid_comfyui::ws_url(&config.engine_host));
        Self {
            config: Arc::new(config),
            client_id: client_id.into(),
            api,
            client,
        }
    }
}
