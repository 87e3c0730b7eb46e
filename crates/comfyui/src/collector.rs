//! Completion waiting and output collection.
//!
//! After a workflow is queued, the worker reads the event stream until
//! the engine reports the prompt finished, then pulls the history
//! record and base64-encodes every produced video file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::WsStream;
use crate::messages::{parse_message, ComfyUIMessage};

/// Output-node id mapped to base64-encoded media blobs, in the order
/// the history record listed them.
pub type Outputs = BTreeMap<String, Vec<String>>;

/// Errors while awaiting completion or collecting outputs.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The event stream closed before the prompt finished.
    #[error("WebSocket closed before execution completed")]
    ConnectionClosed,

    /// A WebSocket receive error.
    #[error("WebSocket receive error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A history request failed.
    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    /// The history record does not contain the prompt.
    #[error("History record missing for prompt {prompt_id}")]
    MissingHistory { prompt_id: String },

    /// The history record has an unexpected shape.
    #[error("Malformed history record: {0}")]
    MalformedHistory(String),

    /// A produced media file could not be read from disk.
    #[error("Failed to read output file {path}: {source}")]
    Media {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read the event stream until `prompt_id` finishes.
///
/// Every frame that is not the terminal signal is tolerated and
/// skipped: binary preview frames, control frames, unparseable text,
/// and events for other prompts sharing this client identity. Only an
/// `executing` event with a `null` node AND a matching prompt id ends
/// the wait. A closed stream before that point is an error.
pub async fn await_completion(
    ws_stream: &mut WsStream,
    prompt_id: &str,
) -> Result<(), CollectError> {
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if text_frame_completes(&text, prompt_id) {
                    tracing::info!(prompt_id = %prompt_id, "Execution completed");
                    return Ok(());
                }
            }
            Ok(Message::Binary(_)) => {
                // Preview image frames; not part of the result.
                tracing::trace!("Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::warn!(?frame, "WebSocket closed by engine");
                return Err(CollectError::ConnectionClosed);
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => return Err(CollectError::WebSocket(e)),
        }
    }
    Err(CollectError::ConnectionClosed)
}

/// Decide whether a text frame is the terminal signal for `prompt_id`.
fn text_frame_completes(text: &str, prompt_id: &str) -> bool {
    match parse_message(text) {
        Ok(ComfyUIMessage::Executing(data)) => {
            if data.prompt_id != prompt_id {
                // Another job on this shared client identity.
                tracing::trace!(other = %data.prompt_id, "Skipping event for different prompt");
                return false;
            }
            match data.node {
                Some(node) => {
                    tracing::debug!(prompt_id = %prompt_id, node = %node, "Executing node");
                    false
                }
                None => true,
            }
        }
        Ok(ComfyUIMessage::Progress(data)) => {
            tracing::debug!(value = data.value, max = data.max, "Generation progress");
            false
        }
        Ok(ComfyUIMessage::ExecutionError(data)) => {
            // Logged for the operator; the job still fails later when
            // the history record carries no outputs, matching the
            // engine contract that only `executing` ends the wait.
            tracing::error!(
                prompt_id = %data.prompt_id,
                error = data.exception_message.as_deref().unwrap_or("unknown"),
                "Execution error reported by engine",
            );
            false
        }
        Ok(_) => false,
        Err(e) => {
            tracing::trace!(error = %e, "Ignoring unparseable frame");
            false
        }
    }
}

/// Extract the produced media paths from a history record.
///
/// Expects `{<prompt_id>: {"outputs": {<node_id>: {"gifs": [{"fullpath": ...}]}}}}`.
/// Every output node appears in the result, with an empty list when it
/// produced no media; within a node the order matches the record.
pub fn outputs_from_history(
    history: &serde_json::Value,
    prompt_id: &str,
) -> Result<Vec<(String, Vec<PathBuf>)>, CollectError> {
    let record = history
        .get(prompt_id)
        .ok_or_else(|| CollectError::MissingHistory {
            prompt_id: prompt_id.to_string(),
        })?;

    let outputs = record
        .get("outputs")
        .and_then(|v| v.as_object())
        .ok_or_else(|| {
            CollectError::MalformedHistory("'outputs' is missing or not an object".to_string())
        })?;

    let mut entries = Vec::with_capacity(outputs.len());
    for (node_id, node_output) in outputs {
        let mut paths = Vec::new();
        if let Some(gifs) = node_output.get("gifs").and_then(|v| v.as_array()) {
            for media in gifs {
                let fullpath = media.get("fullpath").and_then(|v| v.as_str()).ok_or_else(
                    || {
                        CollectError::MalformedHistory(format!(
                            "media entry in node '{node_id}' has no 'fullpath'"
                        ))
                    },
                )?;
                paths.push(PathBuf::from(fullpath));
            }
        }
        entries.push((node_id.clone(), paths));
    }
    Ok(entries)
}

/// Read each referenced file and base64-encode it.
pub async fn encode_outputs(
    entries: Vec<(String, Vec<PathBuf>)>,
) -> Result<Outputs, CollectError> {
    let mut outputs = Outputs::new();
    for (node_id, paths) in entries {
        let mut encoded = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| CollectError::Media {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "Encoded output file");
            encoded.push(BASE64.encode(bytes));
        }
        outputs.insert(node_id, encoded);
    }
    Ok(outputs)
}

/// Fetch the history record for `prompt_id` and collect its media.
pub async fn collect_outputs(
    api: &ComfyUIApi,
    prompt_id: &str,
) -> Result<Outputs, CollectError> {
    let history = api.get_history(prompt_id).await?;
    let entries = outputs_from_history(&history, prompt_id)?;
    encode_outputs(entries).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
