//! Typed ComfyUI WebSocket messages.
//!
//! The engine streams JSON events shaped `{"type": <kind>, "data": {...}}`.
//! Only the `executing` event drives control flow (a `null` node marks
//! completion of a prompt); the rest are parsed for logging. Unknown
//! kinds and malformed frames are a parse error the caller is expected
//! to tolerate.

use serde::Deserialize;

/// Known ComfyUI event kinds, tagged by the `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Queue status broadcast.
    #[serde(rename = "status")]
    Status(serde_json::Value),

    /// A prompt started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(PromptRef),

    /// A node is executing; `node: null` means the prompt finished.
    #[serde(rename = "executing")]
    Executing(ExecutingPayload),

    /// Step-level progress within a node.
    #[serde(rename = "progress")]
    Progress(ProgressPayload),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(PromptRef),

    /// Execution failed.
    #[serde(rename = "execution_error")]
    ExecutionError(ExecutionErrorPayload),
}

/// Minimal payload carrying just the prompt correlation id.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRef {
    pub prompt_id: String,
}

/// Payload for `executing` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingPayload {
    /// Currently executing node, or `None` when the prompt completed.
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload for `progress` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressPayload {
    pub value: i64,
    pub max: i64,
}

/// Payload for `execution_error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionErrorPayload {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub exception_message: Option<String>,
}

/// Parse a text frame into a typed message.
///
/// Errors on malformed JSON or unknown `type` values; callers log and
/// skip rather than abort the stream.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn executing_with_active_node() {
        let msg =
            parse_message(r#"{"type":"executing","data":{"node":"842","prompt_id":"p-1"}}"#)
                .unwrap();
        assert_matches!(msg, ComfyUIMessage::Executing(data) => {
            assert_eq!(data.node.as_deref(), Some("842"));
            assert_eq!(data.prompt_id, "p-1");
        });
    }

    #[test]
    fn executing_null_node_marks_completion() {
        let msg =
            parse_message(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#)
                .unwrap();
        assert_matches!(msg, ComfyUIMessage::Executing(data) => {
            assert!(data.node.is_none());
        });
    }

    #[test]
    fn progress_event() {
        let msg = parse_message(r#"{"type":"progress","data":{"value":4,"max":10}}"#).unwrap();
        assert_matches!(msg, ComfyUIMessage::Progress(data) => {
            assert_eq!(data.value, 4);
            assert_eq!(data.max, 10);
        });
    }

    #[test]
    fn status_payload_is_opaque() {
        let msg = parse_message(
            r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":2}}}}"#,
        )
        .unwrap();
        assert_matches!(msg, ComfyUIMessage::Status(_));
    }

    #[test]
    fn execution_error_with_partial_fields() {
        let msg = parse_message(
            r#"{"type":"execution_error","data":{"prompt_id":"p-9","exception_message":"OOM"}}"#,
        )
        .unwrap();
        assert_matches!(msg, ComfyUIMessage::ExecutionError(data) => {
            assert_eq!(data.exception_message.as_deref(), Some("OOM"));
            assert!(data.node_id.is_none());
        });
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(parse_message(r#"{"type":"crystools.monitor","data":{}}"#).is_err());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_message("binary garbage").is_err());
    }
}
