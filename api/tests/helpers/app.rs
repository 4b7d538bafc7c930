use api::routes::routes;
use api::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use db::models::course_module::{self, ModuleKind, ReportGeneration};
use db::models::service_setting::{self, REQUIRE_EULA};
use db::test_utils::setup_test_db;
use services::Engine;
use services::storage::ContentStore;
use services::testing::{RecordingNotifier, ScriptedClient};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use util::config::PluginConfig;

pub const MODULE_ID: i64 = 10;
pub const WEBHOOK_SECRET: &str = "whsec_api_test";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub client: Arc<ScriptedClient>,
    pub notifier: Arc<RecordingNotifier>,
    _storage: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn test_config() -> PluginConfig {
    PluginConfig {
        api_url: "http://127.0.0.1:1".into(),
        api_key: "key".into(),
        webhook_secret: WEBHOOK_SECRET.into(),
        ..Default::default()
    }
}

pub async fn make_test_app() -> TestApp {
    make_test_app_with(test_config()).await
}

/// Router mounted under `/api` over a fresh in-memory database, with one
/// enabled assignment module and consent not required.
pub async fn make_test_app_with(config: PluginConfig) -> TestApp {
    let db = setup_test_db().await;
    course_module::Entity::upsert(
        &db,
        MODULE_ID,
        ModuleKind::Assign,
        true,
        ReportGeneration::Immediate,
        None,
    )
    .await
    .unwrap();
    service_setting::Entity::set(&db, REQUIRE_EULA, "false")
        .await
        .unwrap();

    let storage = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::new(
        db,
        client.clone(),
        notifier.clone(),
        ContentStore::new(storage.path()),
        config,
    );
    let state = AppState::new(engine);
    let router = Router::new().nest("/api", routes(state.clone()));

    TestApp {
        router,
        state,
        client,
        notifier,
        _storage: storage,
    }
}
