#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use db::models::course_module::{self, ModuleKind, ReportGeneration};
use db::models::service_setting::{self, LATEST_EULA_VERSION, REQUIRE_EULA};
use db::models::similarity_submission::{self, Model};
use db::test_utils::setup_test_db;
use sea_orm::{DatabaseConnection, EntityTrait};
use services::Engine;
use services::adapters::ItemContext;
use services::dispatch_service::{BatchReport, DispatchService};
use services::storage::ContentStore;
use services::submission_service::{IntakeEvent, IntakeReceipt, SubmissionService};
use services::testing::{RecordingNotifier, ScriptedClient};
use db::models::similarity_submission::SubmissionKind;
use std::sync::Arc;
use tempfile::TempDir;
use util::config::PluginConfig;

pub const MODULE_ID: i64 = 10;
pub const STUDENT: i64 = 501;
pub const SECRET: &str = "whsec_test";

pub struct Harness {
    pub engine: Engine,
    pub client: Arc<ScriptedClient>,
    pub notifier: Arc<RecordingNotifier>,
    _storage: TempDir,
}

impl Harness {
    pub fn db(&self) -> &DatabaseConnection {
        &self.engine.db
    }

    pub fn submissions(&self) -> SubmissionService {
        SubmissionService::new(self.engine.clone())
    }

    pub fn dispatcher(&self) -> DispatchService {
        DispatchService::new(self.engine.clone())
    }

    pub async fn intake(&self, event: IntakeEvent, at: DateTime<Utc>) -> IntakeReceipt {
        self.submissions()
            .intake(event, None, at)
            .await
            .expect("intake")
    }

    pub async fn run(&self, at: DateTime<Utc>) -> BatchReport {
        self.dispatcher().run_batch(at).await.expect("batch")
    }

    pub async fn reload(&self, id: i64) -> Model {
        similarity_submission::Entity::find_by_id(id)
            .one(self.db())
            .await
            .expect("query")
            .expect("row")
    }

    pub async fn count(&self) -> usize {
        similarity_submission::Entity::find()
            .all(self.db())
            .await
            .expect("query")
            .len()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

pub fn hours(n: i64) -> DateTime<Utc> {
    t0() + Duration::hours(n)
}

pub fn config() -> PluginConfig {
    PluginConfig {
        api_url: "http://127.0.0.1:1".into(),
        api_key: "key".into(),
        webhook_secret: SECRET.into(),
        ..Default::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(config()).await
}

/// Engine over a fresh in-memory database with one enabled assignment module
/// and consent not required.
pub async fn harness_with(config: PluginConfig) -> Harness {
    let db = setup_test_db().await;
    let storage = tempfile::tempdir().expect("tempdir");
    let client = Arc::new(ScriptedClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    course_module::Entity::upsert(
        &db,
        MODULE_ID,
        ModuleKind::Assign,
        true,
        ReportGeneration::Immediate,
        None,
    )
    .await
    .expect("module");
    service_setting::Entity::set(&db, REQUIRE_EULA, "false")
        .await
        .expect("setting");

    let engine = Engine::new(
        db,
        client.clone(),
        notifier.clone(),
        ContentStore::new(storage.path()),
        config,
    );
    Harness {
        engine,
        client,
        notifier,
        _storage: storage,
    }
}

pub async fn require_eula(db: &DatabaseConnection, version: &str) {
    service_setting::Entity::set(db, REQUIRE_EULA, "true")
        .await
        .expect("setting");
    service_setting::Entity::set(db, LATEST_EULA_VERSION, version)
        .await
        .expect("setting");
}

pub fn text_event(text: &str) -> IntakeEvent {
    IntakeEvent {
        course_module_id: MODULE_ID,
        item_id: Some(77),
        kind: SubmissionKind::Content,
        item: ItemContext {
            submitter_id: STUDENT,
            ..Default::default()
        },
        filename: None,
        text: Some(text.to_string()),
        modified_at: None,
    }
}
