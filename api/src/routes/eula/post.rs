use crate::response::{ApiResponse, engine_error};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::eula_service::EulaService;

#[derive(Debug, Deserialize)]
pub struct AcceptEulaRequest {
    pub user_id: i64,
    pub version: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".into()
}

#[derive(Debug, Serialize)]
pub struct AcceptEulaResponse {
    pub user_id: i64,
    pub accepted_version: String,
    pub accepted_at: DateTime<Utc>,
    /// Submissions released from the consent gate by this acceptance.
    pub released: Vec<i64>,
}

/// POST /api/eula/accept
///
/// Records that a user accepted a EULA version. Any of the user's submissions
/// held back for consent move to `QUEUED` straight away when the accepted
/// version satisfies the published one.
///
/// ### Request Body
/// ```json
/// { "user_id": 501, "version": "v2", "locale": "en" }
/// ```
///
/// ### Responses
/// - `200 OK`
/// ```json
/// {
///   "success": true,
///   "data": { "user_id": 501, "accepted_version": "v2", "accepted_at": "...", "released": [12] },
///   "message": "EULA acceptance recorded"
/// }
/// ```
/// - `400 Bad Request` for an empty version
pub async fn accept_eula(
    State(app_state): State<AppState>,
    Json(req): Json<AcceptEulaRequest>,
) -> Response {
    let outcome = match EulaService::record_acceptance(
        app_state.db(),
        req.user_id,
        &req.version,
        &req.locale,
        Utc::now(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => return engine_error(e),
    };

    let response = AcceptEulaResponse {
        user_id: outcome.record.user_id,
        accepted_version: outcome.record.accepted_version,
        accepted_at: outcome.record.accepted_at,
        released: outcome.released,
    };
    (
        StatusCode::OK,
        Json(ApiResponse::success(response, "EULA acceptance recorded")),
    )
        .into_response()
}
