//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness probe
//! - `/webhooks` → signed callbacks from the similarity service
//! - `/submissions` → intake events, status view, operator resubmission
//! - `/eula` → consent acceptance
//! - `/modules` → module-updated events from the host
//! - `/dispatch` → trigger one dispatch batch

use crate::routes::{
    dispatch::dispatch_routes, eula::eula_routes, health::health_routes,
    modules::modules_routes,
    submissions::{intake_body_limit, submissions_routes}, webhooks::webhook_routes,
};
use crate::state::AppState;
use axum::Router;

pub mod dispatch;
pub mod eula;
pub mod health;
pub mod modules;
pub mod submissions;
pub mod webhooks;

/// Builds the application router. `main` nests it under `/api`.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/webhooks", webhook_routes())
        .nest(
            "/submissions",
            submissions_routes(intake_body_limit(app_state.config())),
        )
        .nest("/eula", eula_routes())
        .nest("/modules", modules_routes())
        .nest("/dispatch", dispatch_routes())
        .with_state(app_state)
}
