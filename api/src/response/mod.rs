use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use services::SubmissionError;

/// JSON envelope for every API response:
/// ```json
/// { "success": true, "data": { ... }, "message": "Submission recorded" }
/// ```
///
/// Error responses carry `T::default()` as `data`.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }
}

/// Shorthand for an error envelope with an empty `data` object.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<Empty>::error(message))).into_response()
}

/// Serialises as `{}`.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

/// Maps an engine error onto a status code and envelope. Storage and
/// database failures are logged and reported without internals.
pub fn engine_error(err: SubmissionError) -> Response {
    match err {
        SubmissionError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("Submission {id} not found"))
        }
        SubmissionError::ModuleNotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("Module {id} not found"))
        }
        SubmissionError::Conflict(id) => error_response(
            StatusCode::CONFLICT,
            format!("Submission {id} changed concurrently, retry the request"),
        ),
        SubmissionError::InvalidTransition { from, to } => error_response(
            StatusCode::CONFLICT,
            format!("Cannot move a submission from {from} to {to}"),
        ),
        SubmissionError::InvalidEvent(reason) => error_response(StatusCode::BAD_REQUEST, reason),
        other => {
            tracing::error!(error = %other, "request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
