use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leadgraph_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `leadgraph_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut run_id = None;

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::ModuleNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "MODULE_NOT_FOUND", core.to_string())
                }
                CoreError::DuplicateDefinition { .. } => {
                    (StatusCode::CONFLICT, "DUPLICATE_DEFINITION", core.to_string())
                }
                CoreError::ScopeMismatch(msg) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "SCOPE_MISMATCH", msg.clone())
                }
                CoreError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", core.to_string())
                }
                CoreError::DispatchFailure { run_id: id, reason } => {
                    tracing::warn!(run_id = id, reason = %reason, "Run left QUEUED without a job");
                    run_id = Some(*id);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "DISPATCH_FAILURE",
                        format!("Run {id} was created but could not be dispatched"),
                    )
                }
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(id) = run_id {
            body["run_id"] = json!(id);
        }

        (status, axum::Json(body)).into_response()
    }
}
