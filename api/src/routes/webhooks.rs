use crate::response::error_response;
use crate::state::AppState;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use services::webhook_service::{EVENT_TYPE_HEADER, SIGNATURE_HEADER, WebhookError, WebhookOutcome};

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/", post(receive_webhook))
}

/// POST /webhooks
///
/// Receives a callback from the similarity service. The raw body is verified
/// against `X-Signature` (hex HMAC-SHA256 with the shared webhook secret)
/// before anything is parsed.
///
/// ### Headers
/// - `X-Signature` (required)
/// - `X-Event-Type` (optional; falls back to the body's `event_type`)
///
/// ### Responses
/// - `200 OK`: the request body echoed back, whether the event changed anything or not
/// - `400 Bad Request`: body is not valid JSON, or lacks the submission id or score
/// - `401 Unauthorized`: missing or wrong signature
/// - `404 Not Found`: no submission with that external id
/// - `409 Conflict`: the submission kept changing underneath the update
async fn receive_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event_type = headers.get(EVENT_TYPE_HEADER).and_then(|v| v.to_str().ok());

    match app_state
        .webhooks()
        .handle(signature, event_type, &body, Utc::now())
        .await
    {
        Ok(outcome) => {
            if let WebhookOutcome::Ignored { reason } = &outcome {
                tracing::debug!(reason = %reason, "webhook acknowledged without changes");
            }
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(WebhookError::Rejected) => {
            error_response(StatusCode::UNAUTHORIZED, "Invalid webhook signature")
        }
        Err(WebhookError::Malformed(reason)) => {
            error_response(StatusCode::BAD_REQUEST, format!("Malformed webhook: {reason}"))
        }
        Err(WebhookError::NotFound(id)) => {
            error_response(StatusCode::NOT_FOUND, format!("Unknown submission {id}"))
        }
        Err(WebhookError::Conflict(id)) => error_response(
            StatusCode::CONFLICT,
            format!("Submission {id} is busy, retry later"),
        ),
        Err(WebhookError::Engine(e)) => crate::response::engine_error(e),
    }
}
