//! ComfyUI engine connector.
//!
//! HTTP API wrapper, WebSocket client, typed message parsing, bounded
//! connection retry, and the per-job submit/await/collect state machine
//! used by the worker to drive a running ComfyUI instance.

pub mod api;
pub mod client;
pub mod collector;
pub mod connect;
pub mod executor;
pub mod messages;

/// TCP port the engine listens on. Fixed by deployment convention;
/// only the host is configurable.
pub const ENGINE_PORT: u16 = 8188;

/// Base HTTP URL for an engine host.
pub fn api_url(host: &str) -> String {
    format!("http://{host}:{ENGINE_PORT}")
}

/// Base WebSocket URL for an engine host.
pub fn ws_url(host: &str) -> String {
    format!("ws://{host}:{ENGINE_PORT}")
}
