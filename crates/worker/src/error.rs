use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use wanvid_comfyui::executor::EngineError;
use wanvid_core::CoreError;

/// Application-level error type for the intake handlers.
///
/// Only job-fatal failures travel this path -- input and validation
/// problems are recovered into structured job responses before an
/// `AppError` can arise. Implements [`IntoResponse`] so the hosting
/// runtime sees a failed job as a consistent JSON 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `wanvid_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An engine connector failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Template(msg) => {
                    tracing::error!(error = %msg, "Template contract violation");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "TEMPLATE_ERROR",
                        msg.clone(),
                    )
                }
            },
            AppError::Engine(e) => {
                tracing::error!(error = %e, "Engine failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ENGINE_ERROR",
                    e.to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
