use crate::state::AppState;
use axum::{Router, routing::post};
use post::run_dispatch;

pub mod post;

/// Builds the `/dispatch` route group.
///
/// Routes:
/// - `POST /dispatch/run` → run one dispatch batch now
pub fn dispatch_routes() -> Router<AppState> {
    Router::new().route("/run", post(run_dispatch))
}
