//! Domain-level error type shared across the workspace.

/// Errors produced by the domain layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A job request failed validation.
    #[error("{0}")]
    Validation(String),

    /// A workflow template does not satisfy the node-binding contract.
    #[error("{0}")]
    Template(String),
}
