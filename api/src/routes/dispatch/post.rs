use crate::response::{ApiResponse, engine_error};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use services::dispatch_service::BatchReport;

/// POST /api/dispatch/run
///
/// Runs one dispatch batch immediately. The host's cron runner can call this
/// instead of relying on the built-in interval loop; overlapping runs are safe.
///
/// ### Responses
/// - `200 OK`
/// ```json
/// {
///   "success": true,
///   "data": {
///     "selected": 3, "advanced": 2, "waiting": 0, "retried": 1, "failed": 0,
///     "skipped": 0, "conflicts": 0, "aborted": 0, "deferred": 0
///   },
///   "message": "Dispatch batch finished"
/// }
/// ```
pub async fn run_dispatch(State(app_state): State<AppState>) -> Response {
    match app_state.dispatcher().run_batch(Utc::now()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::<BatchReport>::success(
                report,
                "Dispatch batch finished",
            )),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}
