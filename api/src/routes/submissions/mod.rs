//! # Submissions Routes Module
//!
//! Routes under `/api/submissions`.
//!
//! ## Structure
//! - `post.rs` - intake event and operator resubmission
//! - `get.rs` - status view

use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use util::config::PluginConfig;
use get::get_submission_status;
use post::{intake_submission, resubmit_submission};

pub mod get;
pub mod post;

/// Room left in an intake body for the metadata part and multipart framing,
/// so a file somewhat over the size limit still reaches the engine and is
/// recorded as `TOO_LARGE`.
pub const INTAKE_BODY_HEADROOM: usize = 1024 * 1024;

/// Largest intake request accepted before the body is rejected with 413.
pub fn intake_body_limit(config: &PluginConfig) -> usize {
    usize::try_from(config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(INTAKE_BODY_HEADROOM)
}

/// Builds the `/submissions` route group.
///
/// Routes:
/// - `POST /submissions`                 → intake event from the host (multipart)
/// - `GET  /submissions/{id}`            → status view
/// - `POST /submissions/{id}/resubmit`   → restart a failed submission
pub fn submissions_routes(intake_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(intake_submission).layer(DefaultBodyLimit::max(intake_limit)),
        )
        .route("/{submission_id}", get(get_submission_status))
        .route("/{submission_id}/resubmit", post(resubmit_submission))
}
