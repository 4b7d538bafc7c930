use crate::state::AppState;
use axum::{Router, routing::post};
use post::accept_eula;

pub mod post;

/// Builds the `/eula` route group.
///
/// Routes:
/// - `POST /eula/accept` → record a user's acceptance of a EULA version
pub fn eula_routes() -> Router<AppState> {
    Router::new().route("/accept", post(accept_eula))
}
