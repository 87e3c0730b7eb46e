//! Bounded fixed-interval connection retry.
//!
//! The engine is expected to come up alongside the worker, so both
//! loops poll at a fixed cadence with a hard attempt ceiling rather
//! than backing off: the HTTP probe gives the engine up to three
//! minutes to become reachable, then the WebSocket connect gets its
//! own three-minute window. Exhaustion is fatal for the job; there is
//! no cancellation hook short of process termination.

use std::time::Duration;

use crate::api::ComfyUIApi;
use crate::client::{ComfyUIClient, WsStream};

/// HTTP probe policy: 180 attempts, 1 second apart.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 180,
            interval: Duration::from_secs(1),
        }
    }
}

/// WebSocket connect policy: 36 attempts, 5 seconds apart.
#[derive(Debug, Clone)]
pub struct WsRetryConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for WsRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 36,
            interval: Duration::from_secs(5),
        }
    }
}

/// Errors from the connection phase.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The HTTP probe ceiling was exhausted.
    #[error("Cannot connect to ComfyUI server after {attempts} attempts. Please check if the server is running.")]
    Unreachable { attempts: u32 },

    /// The WebSocket connect ceiling was exhausted.
    #[error("WebSocket connection timeout after {attempts} attempts")]
    WsTimeout { attempts: u32 },
}

/// Poll the engine's health endpoint until it answers.
pub async fn wait_for_http(
    api: &ComfyUIApi,
    config: &ProbeConfig,
) -> Result<(), ConnectError> {
    for attempt in 1..=config.max_attempts {
        match api.health().await {
            Ok(()) => {
                tracing::info!(attempt, "HTTP connection successful");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "HTTP connection failed",
                );
                if attempt == config.max_attempts {
                    break;
                }
                tokio::time::sleep(config.interval).await;
            }
        }
    }
    Err(ConnectError::Unreachable {
        attempts: config.max_attempts,
    })
}

/// Open the event stream, retrying at a fixed interval.
pub async fn connect_with_retry(
    client: &ComfyUIClient,
    client_id: &str,
    config: &WsRetryConfig,
) -> Result<WsStream, ConnectError> {
    for attempt in 1..=config.max_attempts {
        match client.connect(client_id).await {
            Ok(ws) => {
                tracing::info!(attempt, "WebSocket connection successful");
                return Ok(ws);
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "WebSocket connection failed",
                );
                if attempt == config.max_attempts {
                    break;
                }
                tokio::time::sleep(config.interval).await;
            }
        }
    }
    Err(ConnectError::WsTimeout {
        attempts: config.max_attempts,
    })
}
