use crate::response::{ApiResponse, engine_error, error_response};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use db::models::similarity_submission::Model as SubmissionModel;
use services::submission_service::{IntakeEvent, IntakeOutcome, IntakeReceipt};

/// POST /api/submissions
///
/// Intake event from the host: a piece of work was submitted or changed.
/// Repeating the same event is a no-op.
///
/// ### Request Body (Multipart Form Data)
/// - `metadata` (JSON, required): the event
///   ```json
///   {
///     "course_module_id": 10,
///     "item_id": 77,
///     "kind": "file",
///     "submitter_id": 501,
///     "owner_id": null,
///     "group_id": null,
///     "team_submission": false,
///     "state": "submitted",
///     "filename": "essay.docx",
///     "text": null,
///     "modified_at": "2026-01-05T09:00:00Z"
///   }
///   ```
///   `content` submissions carry their text in `text` and send no file.
/// - `file` (file, optional): the bytes of a `file` submission
///
/// ### Responses
/// - `201 Created` when a new submission was recorded
/// - `200 OK` when an existing one was re-evaluated, left unchanged, or the module has checking disabled
/// - `400 Bad Request` for a missing or invalid `metadata` part, or more than one file
/// - `404 Not Found` for an unknown course module
/// - `413 Payload Too Large` when the body exceeds the configured file size limit by more than the metadata headroom
pub async fn intake_submission(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let mut event: Option<IntakeEvent> = None;
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(e.status(), format!("Invalid multipart body: {e}"));
            }
        };

        match field.name().unwrap_or("") {
            "metadata" => {
                let raw = match field.bytes().await {
                    Ok(raw) => raw,
                    Err(e) => {
                        return error_response(StatusCode::BAD_REQUEST, format!("Unreadable metadata: {e}"));
                    }
                };
                match serde_json::from_slice::<IntakeEvent>(&raw) {
                    Ok(parsed) => event = Some(parsed),
                    Err(e) => {
                        return error_response(StatusCode::BAD_REQUEST, format!("Invalid metadata: {e}"));
                    }
                }
            }
            "file" => {
                if file_bytes.is_some() {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        "Only one file may be uploaded per request",
                    );
                }
                file_name = field.file_name().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => file_bytes = Some(bytes.to_vec()),
                    Err(e) => {
                        return error_response(e.status(), format!("Unreadable file: {e}"));
                    }
                }
            }
            _ => continue,
        }
    }

    let Some(mut event) = event else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: metadata");
    };
    if event.filename.is_none() {
        event.filename = file_name;
    }

    match app_state
        .submissions()
        .intake(event, file_bytes, Utc::now())
        .await
    {
        Ok(receipt) => {
            let (status, message) = match receipt.outcome {
                IntakeOutcome::Created => (StatusCode::CREATED, "Submission recorded"),
                IntakeOutcome::Requeued => (StatusCode::OK, "Modified submission queued again"),
                IntakeOutcome::Regated => (StatusCode::OK, "Submission re-evaluated"),
                IntakeOutcome::Unchanged => (StatusCode::OK, "Submission unchanged"),
                IntakeOutcome::Ignored => (StatusCode::OK, "Checking is disabled for this module"),
            };
            (status, Json(ApiResponse::<IntakeReceipt>::success(receipt, message))).into_response()
        }
        Err(e) => engine_error(e),
    }
}

/// POST /api/submissions/{submission_id}/resubmit
///
/// Operator resubmission: a submission in `ERROR` starts a fresh pass from
/// `QUEUED` with its attempt counter reset.
///
/// ### Responses
/// - `200 OK` with the updated submission
/// - `404 Not Found`
/// - `409 Conflict` when the submission is not in `ERROR`
pub async fn resubmit_submission(
    State(app_state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> Response {
    match app_state
        .submissions()
        .resubmit(submission_id, Utc::now())
        .await
    {
        Ok(model) => (
            StatusCode::OK,
            Json(ApiResponse::<SubmissionModel>::success(
                model,
                "Submission queued for another attempt",
            )),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}
