//! Per-job engine state machine: probe, connect, submit, await, collect.

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::ComfyUIClient;
use crate::collector::{self, CollectError, Outputs};
use crate::connect::{self, ConnectError, ProbeConfig, WsRetryConfig};

/// Errors from the engine connector. All variants are fatal for the
/// job; retries happen only inside the two connect loops.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Submit a composed workflow and collect its produced media.
///
/// Steps, in order:
/// 1. poll the HTTP health endpoint until the engine answers
///    (180 attempts, 1s apart),
/// 2. open the event stream scoped to `client_id`
///    (36 attempts, 5s apart),
/// 3. queue the workflow and capture the engine's prompt id,
/// 4. read events until the prompt reports completion,
/// 5. fetch the history record and base64-encode every listed file.
///
/// The event stream is opened before submission so no completion event
/// can be missed between queueing and subscribing.
pub async fn submit_and_collect(
    api: &ComfyUIApi,
    client: &ComfyUIClient,
    client_id: &str,
    workflow: &serde_json::Value,
) -> Result<Outputs, EngineError> {
    connect::wait_for_http(api, &ProbeConfig::default()).await?;

    let mut ws_stream =
        connect::connect_with_retry(client, client_id, &WsRetryConfig::default()).await?;

    let submit = api.submit_workflow(workflow, client_id).await?;
    tracing::info!(prompt_id = %submit.prompt_id, "Workflow queued");

    collector::await_completion(&mut ws_stream, &submit.prompt_id).await?;

    let outputs = collector::collect_outputs(api, &submit.prompt_id).await?;

    if let Err(e) = futures::SinkExt::close(&mut ws_stream).await {
        tracing::debug!(error = %e, "WebSocket close failed");
    }

    Ok(outputs)
}
