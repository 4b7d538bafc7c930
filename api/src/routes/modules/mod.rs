//! # Modules Routes Module
//!
//! Module-updated events from the host under `/api/modules`.
//!
//! ## Structure
//! - `put.rs` - PUT handler storing module settings

use crate::state::AppState;
use axum::{Router, routing::put};
use put::update_module;

pub mod put;

/// Builds the `/modules` route group.
///
/// Routes:
/// - `PUT /modules/{course_module_id}` → store kind, checking flag, report policy and due date
pub fn modules_routes() -> Router<AppState> {
    Router::new().route("/{course_module_id}", put(update_module))
}
