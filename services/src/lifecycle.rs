//! Step logic shared by the dispatch loop and webhook reconciliation.

use crate::client::{ClientError, ReportRequest};
use crate::engine::Engine;
use crate::error::SubmissionError;
use crate::notifier::{self, Recipient, Template};
use crate::report_schedule;
use crate::state_machine::{self, RetryOutcome, RetryPolicy};
use chrono::{DateTime, Utc};
use db::models::course_module::{self, ReportGeneration};
use db::models::similarity_submission::{ErrorCode, Model, SubmissionStatus};
use serde_json::json;
use std::future::Future;
use util::config::PluginConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Retried(DateTime<Utc>),
    Failed(ErrorCode),
}

/// Runs one remote call under the configured per-call timeout.
pub async fn call<T, F>(
    config: &PluginConfig,
    operation: &'static str,
    fut: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(config.request_timeout(), fut).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::timeout(operation)),
    }
}

/// Folds a remote failure into the record's status and retry bookkeeping.
pub fn apply_client_failure(
    model: &mut Model,
    error: &ClientError,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<FailureOutcome, SubmissionError> {
    let outcome = match error {
        ClientError::Permanent(code) => {
            state_machine::fail(model, *code)?;
            FailureOutcome::Failed(*code)
        }
        ClientError::Malformed { .. } => {
            state_machine::fail(model, ErrorCode::MalformedResponse)?;
            FailureOutcome::Failed(ErrorCode::MalformedResponse)
        }
        _ => match state_machine::record_transient_failure(model, policy, now)? {
            RetryOutcome::Scheduled(at) => FailureOutcome::Retried(at),
            RetryOutcome::Exhausted => FailureOutcome::Failed(ErrorCode::TooManyAttempts),
        },
    };

    match outcome {
        FailureOutcome::Retried(at) => tracing::warn!(
            submission_id = model.id,
            status = %model.status,
            attempts = model.attempts,
            next_retry_at = %at,
            error = %error,
            "remote call failed, will retry"
        ),
        FailureOutcome::Failed(code) => tracing::error!(
            submission_id = model.id,
            attempts = model.attempts,
            error_code = %code,
            error = %error,
            "submission failed"
        ),
    }
    Ok(outcome)
}

/// Asks the service to build the similarity report.
pub async fn send_report_request(engine: &Engine, model: &Model) -> Result<(), ClientError> {
    const OP: &str = "request_report";
    let Some(external_id) = model.external_id.as_deref() else {
        return Err(ClientError::Malformed {
            operation: OP,
            detail: "submission has no external id".into(),
        });
    };
    call(
        &engine.config,
        OP,
        engine
            .client
            .request_report(external_id, &ReportRequest::default()),
    )
    .await
}

/// Records a successful report request and schedules the next generation.
pub fn mark_requested(
    model: &mut Model,
    module: Option<&course_module::Model>,
    now: DateTime<Utc>,
) -> Result<(), SubmissionError> {
    state_machine::transition(model, SubmissionStatus::Requested)?;
    model.requested_at = Some(now);
    let (policy, due) = module
        .map(|m| (m.report_generation, m.due_date))
        .unwrap_or((ReportGeneration::Immediate, None));
    let schedule = report_schedule::after_request(policy, due, now);
    model.to_generate = schedule.to_generate;
    model.generation_time = schedule.generation_time;
    Ok(())
}

/// Applies a similarity score. Returns whether anything changed, so a
/// repeated delivery of the same score is a no-op.
pub fn apply_score(model: &mut Model, score: i32) -> Result<bool, SubmissionError> {
    match model.status {
        SubmissionStatus::Requested | SubmissionStatus::Processing => {
            state_machine::transition(model, SubmissionStatus::Complete)?;
            model.overall_score = Some(score);
            Ok(true)
        }
        SubmissionStatus::Complete if model.overall_score != Some(score) => {
            model.overall_score = Some(score);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Sends whatever the change from `before` to `after` calls for.
pub async fn notify_transition(engine: &Engine, before: SubmissionStatus, after: &Model) {
    if before == after.status {
        return;
    }
    match after.status {
        SubmissionStatus::Complete if engine.config.send_receipts => {
            let data = json!({
                "submission_id": after.id,
                "course_module_id": after.course_module_id,
                "filename": after.filename,
                "identifier": after.identifier,
                "submitted_at": after.submitted_at,
            });
            notifier::notify(
                engine.notifier.as_ref(),
                Recipient::User(after.author_id),
                Template::DigitalReceipt,
                data,
            )
            .await;
        }
        SubmissionStatus::EulaNotAccepted => {
            let data = json!({
                "submission_id": after.id,
                "course_module_id": after.course_module_id,
            });
            notifier::notify(
                engine.notifier.as_ref(),
                Recipient::User(after.submitter_id),
                Template::EulaRequired,
                data,
            )
            .await;
        }
        SubmissionStatus::Error if after.error_code == Some(ErrorCode::TooManyAttempts) => {
            if let Some(admin) = engine.config.admin_email.clone() {
                let data = json!({
                    "submission_id": after.id,
                    "attempts": after.attempts,
                    "status_before": before.as_str(),
                });
                notifier::notify(
                    engine.notifier.as_ref(),
                    Recipient::Admin(admin),
                    Template::AdminAlert,
                    data,
                )
                .await;
            }
        }
        _ => {}
    }
}
