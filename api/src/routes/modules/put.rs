use crate::response::{ApiResponse, engine_error};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::module_service::{ModuleService, ModuleUpdate, ModuleUpdateOutcome};

/// PUT /api/modules/{course_module_id}
///
/// Records the host's current settings for a course module. Creates the module
/// on first sight. When the due date moves, pending report generations tied
/// to it are rescheduled.
///
/// ### Request Body
/// ```json
/// {
///   "module_kind": "assign",
///   "enabled": true,
///   "report_generation": "IMMEDIATE_AND_DUE_DATE",
///   "due_date": "2026-03-01T23:59:00Z"
/// }
/// ```
///
/// ### Responses
/// - `200 OK` with the stored module and the number of rescheduled submissions
/// - `422 Unprocessable Entity` when the body does not match the shape above
pub async fn update_module(
    State(app_state): State<AppState>,
    Path(course_module_id): Path<i64>,
    Json(update): Json<ModuleUpdate>,
) -> Response {
    match ModuleService::update(app_state.db(), course_module_id, update).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::<ModuleUpdateOutcome>::success(
                outcome,
                "Module settings updated",
            )),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}
