mod common;

use chrono::Duration;
use common::*;
use db::models::course_module::{ModuleKind, ReportGeneration};
use db::models::service_setting::{self, LATEST_EULA_VERSION, REQUIRE_EULA, WEBHOOK_ID};
use db::models::similarity_submission::SubmissionStatus;
use serde_json::json;
use services::client::{EnabledFeatures, EulaVersionInfo};
use services::maintenance_service::MaintenanceService;
use services::module_service::{ModuleService, ModuleUpdate};
use services::testing::transient;

fn update(policy: ReportGeneration, due: Option<chrono::DateTime<chrono::Utc>>) -> ModuleUpdate {
    ModuleUpdate {
        module_kind: ModuleKind::Assign,
        enabled: true,
        report_generation: policy,
        due_date: due,
    }
}

#[tokio::test]
async fn due_date_policy_holds_report_until_due() {
    let h = harness().await;
    let due = hours(48);
    ModuleService::update(h.db(), MODULE_ID, update(ReportGeneration::DueDate, Some(due)))
        .await
        .unwrap();

    let id = h.intake(text_event("essay"), t0()).await.submission.unwrap().id;
    assert_eq!(h.reload(id).await.generation_time, Some(due));

    h.run(t0()).await;
    h.run(t0()).await;
    // Processed, but the report waits for the due date.
    h.run(t0()).await;
    let row = h.reload(id).await;
    assert_eq!(row.status, SubmissionStatus::Uploaded);
    assert!(row.processed_at.is_some());
    assert_eq!(h.run(hours(1)).await.selected, 0);

    h.run(due).await;
    assert_eq!(h.reload(id).await.status, SubmissionStatus::Requested);
}

#[tokio::test]
async fn moving_due_date_reschedules_pending_reports() {
    let h = harness().await;
    let old_due = hours(72);
    let new_due = hours(24);
    ModuleService::update(h.db(), MODULE_ID, update(ReportGeneration::DueDate, Some(old_due)))
        .await
        .unwrap();
    let id = h.intake(text_event("essay"), t0()).await.submission.unwrap().id;

    let outcome =
        ModuleService::update(h.db(), MODULE_ID, update(ReportGeneration::DueDate, Some(new_due)))
            .await
            .unwrap();
    assert_eq!(outcome.rescheduled, 1);
    assert_eq!(h.reload(id).await.generation_time, Some(new_due));

    // Same due date again moves nothing.
    let outcome =
        ModuleService::update(h.db(), MODULE_ID, update(ReportGeneration::DueDate, Some(new_due)))
            .await
            .unwrap();
    assert_eq!(outcome.rescheduled, 0);
}

#[tokio::test]
async fn immediate_and_due_date_regenerates_after_due() {
    let h = harness().await;
    let due = hours(24);
    ModuleService::update(
        h.db(),
        MODULE_ID,
        update(ReportGeneration::ImmediateAndDueDate, Some(due)),
    )
    .await
    .unwrap();
    let id = h.intake(text_event("essay"), t0()).await.submission.unwrap().id;
    for _ in 0..4 {
        h.run(t0()).await;
    }
    let row = h.reload(id).await;
    assert_eq!(row.status, SubmissionStatus::Complete);
    assert!(row.to_generate);
    assert_eq!(row.generation_time, Some(due));

    // Regeneration failure keeps the finished report and tries again later.
    h.client.push_report(Err(transient("request_report")));
    h.run(due).await;
    let row = h.reload(id).await;
    assert_eq!(row.status, SubmissionStatus::Complete);
    assert_eq!(row.generation_time, Some(due + Duration::hours(1)));

    h.run(due + Duration::hours(1)).await;
    let row = h.reload(id).await;
    assert_eq!(row.status, SubmissionStatus::Requested);
    assert!(!row.to_generate);

    h.run(due + Duration::hours(1)).await;
    assert_eq!(h.reload(id).await.status, SubmissionStatus::Complete);
    assert_eq!(h.client.call_count("request_report"), 3);
}

#[tokio::test]
async fn disabled_module_ignores_submissions() {
    let h = harness().await;
    let mut settings = update(ReportGeneration::Immediate, None);
    settings.enabled = false;
    ModuleService::update(h.db(), MODULE_ID, settings).await.unwrap();

    let receipt = h.intake(text_event("essay"), t0()).await;
    assert!(receipt.submission.is_none());
    assert_eq!(h.count().await, 0);
}

#[tokio::test]
async fn refresh_stores_published_settings() {
    let h = harness().await;
    h.client.push_eula(Ok(EulaVersionInfo {
        version: "v7".into(),
        url: Some("https://example.invalid/eula/v7".into()),
    }));
    h.client.push_features(Ok(EnabledFeatures::from_value(
        json!({"tenant": {"require_eula": true}}),
    )));

    let maintenance = MaintenanceService::new(h.engine.clone());
    let snapshot = maintenance.refresh_service_settings(t0()).await.unwrap();
    assert_eq!(snapshot.eula_version, "v7");
    assert!(snapshot.require_eula);
    assert!(snapshot.eula_changed);
    assert_eq!(
        service_setting::Entity::get(h.db(), LATEST_EULA_VERSION).await.unwrap().as_deref(),
        Some("v7")
    );
    assert_eq!(
        service_setting::Entity::get(h.db(), REQUIRE_EULA).await.unwrap().as_deref(),
        Some("true")
    );

    h.client.push_eula(Ok(EulaVersionInfo {
        version: "v7".into(),
        url: None,
    }));
    let snapshot = maintenance.refresh_service_settings(hours(1)).await.unwrap();
    assert!(!snapshot.eula_changed);

    // A new version gates the next submission.
    let receipt = h.intake(text_event("essay"), hours(1)).await;
    assert_eq!(
        receipt.submission.unwrap().status,
        SubmissionStatus::EulaNotAccepted
    );
}

#[tokio::test]
async fn refresh_failure_keeps_previous_settings() {
    let h = harness().await;
    service_setting::Entity::set(h.db(), LATEST_EULA_VERSION, "v3").await.unwrap();
    h.client.push_eula(Err(transient("latest_eula")));

    let maintenance = MaintenanceService::new(h.engine.clone());
    assert!(maintenance.refresh_service_settings(t0()).await.is_err());
    assert_eq!(
        service_setting::Entity::get(h.db(), LATEST_EULA_VERSION).await.unwrap().as_deref(),
        Some("v3")
    );
}

#[tokio::test]
async fn webhook_registration_happens_once() {
    let mut config = config();
    config.webhook_url = Some("https://lms.example.invalid/similarity/webhooks".into());
    let h = harness_with(config).await;
    let maintenance = MaintenanceService::new(h.engine.clone());

    assert_eq!(maintenance.ensure_webhook().await.unwrap().as_deref(), Some("wh-1"));
    assert_eq!(maintenance.ensure_webhook().await.unwrap().as_deref(), Some("wh-1"));
    assert_eq!(h.client.call_count("register_webhook"), 1);
    assert_eq!(
        service_setting::Entity::get(h.db(), WEBHOOK_ID).await.unwrap().as_deref(),
        Some("wh-1")
    );
}

#[tokio::test]
async fn webhook_registration_skipped_without_url() {
    let h = harness().await;
    let maintenance = MaintenanceService::new(h.engine.clone());
    assert!(maintenance.ensure_webhook().await.unwrap().is_none());
    assert!(h.client.calls().is_empty());
}
