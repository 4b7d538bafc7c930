use crate::response::{ApiResponse, engine_error};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::submission_service::StatusView;

/// GET /api/submissions/{submission_id}
///
/// Status shown next to a submission in the host: lifecycle status, score,
/// and a human-readable reason when the check failed or is waiting on consent.
///
/// ### Responses
/// - `200 OK`
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": 12,
///     "status": "ERROR",
///     "error_code": "TOO_LITTLE_TEXT",
///     "reason": "The submission does not have enough text to check.",
///     "overall_score": null,
///     "external_id": "a1b2",
///     "attempts": 0,
///     "next_retry_at": null,
///     "submitted_at": "2026-01-05T09:00:00Z",
///     "show_other_posts_links": false
///   },
///   "message": "Submission status retrieved"
/// }
/// ```
/// - `404 Not Found`
pub async fn get_submission_status(
    State(app_state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> Response {
    match app_state.submissions().status_view(submission_id).await {
        Ok(view) => (
            StatusCode::OK,
            Json(ApiResponse::<StatusView>::success(
                view,
                "Submission status retrieved",
            )),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}
