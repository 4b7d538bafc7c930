//! Application state shared across Axum route handlers and the scheduler loops.

use sea_orm::DatabaseConnection;
use services::Engine;
use services::dispatch_service::DispatchService;
use services::maintenance_service::MaintenanceService;
use services::submission_service::SubmissionService;
use services::webhook_service::WebhookService;
use util::config::PluginConfig;

/// Central application state shared across the server.
///
/// Wraps the engine (database, service client, notifier, content store and
/// plugin configuration). Every entry point is built from it on demand; they
/// are cheap handles over the same shared resources.
#[derive(Clone)]
pub struct AppState {
    engine: Engine,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.engine.db
    }

    pub fn config(&self) -> &PluginConfig {
        &self.engine.config
    }

    pub fn submissions(&self) -> SubmissionService {
        SubmissionService::new(self.engine.clone())
    }

    pub fn dispatcher(&self) -> DispatchService {
        DispatchService::new(self.engine.clone())
    }

    pub fn webhooks(&self) -> WebhookService {
        WebhookService::new(self.engine.clone())
    }

    pub fn maintenance(&self) -> MaintenanceService {
        MaintenanceService::new(self.engine.clone())
    }
}
