//! Periodic dispatch: moves every eligible submission one step forward.
//!
//! A batch selects eligible rows, claims each with a version check and runs
//! the step for its status on a bounded worker pool. Each item ends with a
//! single versioned commit, so a crash or a lost race leaves the row exactly
//! as the previous commit wrote it.

use crate::cache::BatchCache;
use crate::client::{
    ClientError, CreateSubmissionRequest, EulaAcceptance, RemoteSubmissionStatus, ScoreStatus,
    SubmissionMetadata,
};
use crate::engine::Engine;
use crate::error::SubmissionError;
use crate::eula_service;
use crate::lifecycle::{self, FailureOutcome};
use crate::state_machine::{self, RetryOutcome, RetryPolicy};
use chrono::{DateTime, Utc};
use db::models::similarity_submission::{self, ErrorCode, Model, SubmissionStatus};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub selected: usize,
    pub advanced: usize,
    pub waiting: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub aborted: usize,
    /// Not started because the batch budget ran out.
    pub deferred: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Advanced,
    Waiting,
    Retried,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Done(Step),
    /// Claim lost to another writer.
    Skipped,
    /// Commit lost to another writer.
    Conflict,
    /// Local failure; nothing written.
    Aborted,
}

impl BatchReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Done(Step::Advanced) => self.advanced += 1,
            ItemOutcome::Done(Step::Waiting) => self.waiting += 1,
            ItemOutcome::Done(Step::Retried) => self.retried += 1,
            ItemOutcome::Done(Step::Failed) => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Conflict => self.conflicts += 1,
            ItemOutcome::Aborted => self.aborted += 1,
        }
    }
}

impl From<FailureOutcome> for Step {
    fn from(outcome: FailureOutcome) -> Self {
        match outcome {
            FailureOutcome::Retried(_) => Step::Retried,
            FailureOutcome::Failed(_) => Step::Failed,
        }
    }
}

#[derive(Clone)]
pub struct DispatchService {
    engine: Engine,
}

impl DispatchService {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Runs one batch. Safe to call repeatedly and concurrently with webhooks;
    /// overlapping batches only contend on claims.
    pub async fn run_batch(&self, now: DateTime<Utc>) -> Result<BatchReport, SubmissionError> {
        let config = &self.engine.config;
        let started = Instant::now();
        let budget = config.batch_budget();

        let rows =
            similarity_submission::Entity::find_dispatchable(&self.engine.db, now, config.batch_size)
                .await?;

        let mut report = BatchReport {
            selected: rows.len(),
            ..Default::default()
        };
        if rows.is_empty() {
            tracing::debug!("dispatch batch: nothing to do");
            return Ok(report);
        }

        let cache = Arc::new(BatchCache::new());
        let permits = Arc::new(Semaphore::new(config.dispatch_workers.max(1)));
        let mut workers = JoinSet::new();

        for row in rows {
            if started.elapsed() >= budget {
                report.deferred += 1;
                continue;
            }
            let Ok(permit) = permits.clone().acquire_owned().await else {
                report.deferred += 1;
                continue;
            };
            // Waiting for a permit may have used up the budget.
            if started.elapsed() >= budget {
                report.deferred += 1;
                continue;
            }

            let engine = self.engine.clone();
            let cache = cache.clone();
            workers.spawn(async move {
                let _permit = permit;
                process_one(&engine, &cache, row, now).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "dispatch worker panicked");
                    report.aborted += 1;
                }
            }
        }

        tracing::info!(
            selected = report.selected,
            advanced = report.advanced,
            waiting = report.waiting,
            retried = report.retried,
            failed = report.failed,
            skipped = report.skipped,
            conflicts = report.conflicts,
            aborted = report.aborted,
            deferred = report.deferred,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch batch finished"
        );
        Ok(report)
    }
}

async fn process_one(engine: &Engine, cache: &BatchCache, row: Model, now: DateTime<Utc>) -> ItemOutcome {
    let db = &engine.db;
    let claimed = match similarity_submission::Entity::claim(db, &row, now, engine.config.lease()).await {
        Ok(Some(claimed)) => claimed,
        Ok(None) => {
            tracing::debug!(submission_id = row.id, "claim lost");
            return ItemOutcome::Skipped;
        }
        Err(e) => {
            tracing::error!(submission_id = row.id, error = %e, "claim failed");
            return ItemOutcome::Aborted;
        }
    };

    let before = claimed.status;
    let mut next = claimed.clone();
    next.lease_until = None;

    let step = match advance(engine, cache, &mut next, now).await {
        Ok(step) => step,
        Err(e) => {
            tracing::error!(submission_id = claimed.id, status = %before, error = %e, "dispatch step aborted");
            release(engine, &claimed).await;
            return ItemOutcome::Aborted;
        }
    };

    match similarity_submission::Entity::commit(db, next, claimed.version).await {
        Ok(Some(stored)) => {
            if stored.status != before {
                tracing::info!(
                    submission_id = stored.id,
                    external_id = stored.external_id.as_deref().unwrap_or(""),
                    from = %before,
                    to = %stored.status,
                    attempts = stored.attempts,
                    "submission advanced"
                );
            }
            lifecycle::notify_transition(engine, before, &stored).await;
            ItemOutcome::Done(step)
        }
        Ok(None) => {
            tracing::info!(submission_id = claimed.id, "submission changed during dispatch, dropping step");
            ItemOutcome::Conflict
        }
        Err(e) => {
            tracing::error!(submission_id = claimed.id, error = %e, "dispatch commit failed");
            release(engine, &claimed).await;
            ItemOutcome::Aborted
        }
    }
}

async fn release(engine: &Engine, claimed: &Model) {
    if let Err(e) = similarity_submission::Entity::release(&engine.db, claimed).await {
        tracing::warn!(submission_id = claimed.id, error = %e, "could not release lease, it will expire");
    }
}

/// Runs the step for the row's status, mutating `model` in place. Remote
/// failures are recorded on the row; only local failures return `Err`.
async fn advance(
    engine: &Engine,
    cache: &BatchCache,
    model: &mut Model,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    let policy = RetryPolicy::from_config(&engine.config);
    match model.status {
        SubmissionStatus::EulaNotAccepted => recheck_gate(engine, cache, model, &policy, now).await,
        SubmissionStatus::Queued => create_remote(engine, cache, model, &policy, now).await,
        SubmissionStatus::Created => upload_content(engine, model, &policy, now).await,
        SubmissionStatus::Uploaded => poll_processing(engine, cache, model, &policy, now).await,
        SubmissionStatus::Requested | SubmissionStatus::Processing => {
            poll_score(engine, model, &policy, now).await
        }
        SubmissionStatus::Complete => regenerate(engine, cache, model, &policy, now).await,
        SubmissionStatus::NotSent | SubmissionStatus::Error | SubmissionStatus::EmptyOrNoFile => {
            Ok(Step::Waiting)
        }
    }
}

async fn gate_passes(engine: &Engine, cache: &BatchCache, model: &Model) -> Result<bool, SubmissionError> {
    let requirement = cache.requirement(&engine.db).await?;
    let record = cache.consent(&engine.db, model.submitter_id).await?;
    Ok(eula_service::may_proceed(record.as_ref(), &requirement))
}

async fn recheck_gate(
    engine: &Engine,
    cache: &BatchCache,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    if gate_passes(engine, cache, model).await? {
        state_machine::transition(model, SubmissionStatus::Queued)?;
        return Ok(Step::Advanced);
    }
    // Still gated: look again later without spending an attempt.
    model.next_retry_at = Some(now + policy.backoff);
    Ok(Step::Waiting)
}

async fn create_remote(
    engine: &Engine,
    cache: &BatchCache,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    if !gate_passes(engine, cache, model).await? {
        state_machine::transition(model, SubmissionStatus::EulaNotAccepted)?;
        return Ok(Step::Waiting);
    }
    if model.content_size < 0 || model.content_size as u64 > engine.config.max_file_size {
        state_machine::fail(model, ErrorCode::TooLarge)?;
        return Ok(Step::Failed);
    }

    let eula = cache
        .consent(&engine.db, model.submitter_id)
        .await?
        .map(|record| EulaAcceptance {
            version: record.accepted_version,
            accepted_timestamp: record.accepted_at,
            language: record.locale,
        });
    let request = CreateSubmissionRequest {
        owner: model.author_id.to_string(),
        submitter: model.submitter_id.to_string(),
        title: model
            .filename
            .clone()
            .unwrap_or_else(|| format!("content submission {}", model.id)),
        owner_default_permission_set: "LEARNER".into(),
        submitter_default_permission_set: if model.submitter_id == model.author_id {
            "LEARNER".into()
        } else {
            "INSTRUCTOR".into()
        },
        eula,
        metadata: SubmissionMetadata {
            course_module_id: model.course_module_id,
            group_id: model.group_id,
            original_submitted_time: model.submitted_at,
        },
    };

    let result = lifecycle::call(
        &engine.config,
        "create_submission",
        engine.client.create_submission(&request),
    )
    .await;

    match result {
        Ok(created) => {
            state_machine::transition(model, SubmissionStatus::Created)?;
            model.external_id = Some(created.id);
            Ok(Step::Advanced)
        }
        Err(e) => Ok(lifecycle::apply_client_failure(model, &e, policy, now)?.into()),
    }
}

async fn upload_content(
    engine: &Engine,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    let (Some(external_id), Some(path)) = (model.external_id.clone(), model.content_path.clone())
    else {
        state_machine::fail(model, ErrorCode::ProcessingError)?;
        return Ok(Step::Failed);
    };

    let content = match engine.store.read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::error!(submission_id = model.id, path = %path, "stored content is missing");
            state_machine::fail(model, ErrorCode::ProcessingError)?;
            return Ok(Step::Failed);
        }
        Err(e) => {
            tracing::warn!(submission_id = model.id, path = %path, error = %e, "stored content unreadable");
            return Ok(match state_machine::record_transient_failure(model, policy, now)? {
                RetryOutcome::Scheduled(_) => Step::Retried,
                RetryOutcome::Exhausted => Step::Failed,
            });
        }
    };
    let filename = model
        .filename
        .clone()
        .unwrap_or_else(|| format!("content-{}.txt", model.id));

    let result = lifecycle::call(
        &engine.config,
        "upload_original",
        engine.client.upload_original(&external_id, &filename, content),
    )
    .await;

    match result {
        Ok(()) => {
            state_machine::transition(model, SubmissionStatus::Uploaded)?;
            Ok(Step::Advanced)
        }
        Err(e) => Ok(lifecycle::apply_client_failure(model, &e, policy, now)?.into()),
    }
}

/// Catches up on processing the webhook may not have reported, then requests
/// the report once generation is due.
async fn poll_processing(
    engine: &Engine,
    cache: &BatchCache,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    let mut step = Step::Waiting;

    if model.processed_at.is_none() {
        let Some(external_id) = model.external_id.clone() else {
            state_machine::fail(model, ErrorCode::ProcessingError)?;
            return Ok(Step::Failed);
        };
        let result = lifecycle::call(
            &engine.config,
            "get_submission_info",
            engine.client.get_submission_info(&external_id),
        )
        .await;

        match result {
            Ok(info) => match info.status {
                RemoteSubmissionStatus::Complete => {
                    model.processed_at = Some(now);
                    step = Step::Advanced;
                }
                RemoteSubmissionStatus::Error => {
                    let code = info
                        .error_code
                        .as_deref()
                        .map(ErrorCode::from_remote)
                        .unwrap_or(ErrorCode::ProcessingError);
                    state_machine::fail(model, code)?;
                    return Ok(Step::Failed);
                }
                RemoteSubmissionStatus::Created | RemoteSubmissionStatus::Processing => {
                    return Ok(Step::Waiting);
                }
            },
            Err(e) => return Ok(lifecycle::apply_client_failure(model, &e, policy, now)?.into()),
        }
    }

    if model.generation_due(now) {
        return request_report(engine, cache, model, policy, now).await;
    }
    Ok(step)
}

async fn request_report(
    engine: &Engine,
    cache: &BatchCache,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    match lifecycle::send_report_request(engine, model).await {
        Ok(()) => {
            let module = cache.module(&engine.db, model.course_module_id).await?;
            lifecycle::mark_requested(model, module.as_ref(), now)?;
            Ok(Step::Advanced)
        }
        Err(e) if model.status == SubmissionStatus::Complete && e.is_transient() => {
            // A finished report stays finished; retry the regeneration later.
            model.generation_time = Some(now + policy.backoff);
            tracing::warn!(submission_id = model.id, error = %e, "report regeneration deferred");
            Ok(Step::Retried)
        }
        Err(e) if model.status == SubmissionStatus::Complete => {
            tracing::warn!(submission_id = model.id, error = %e, "report regeneration dropped");
            model.to_generate = false;
            model.generation_time = None;
            Ok(Step::Failed)
        }
        Err(e) => Ok(lifecycle::apply_client_failure(model, &e, policy, now)?.into()),
    }
}

async fn poll_score(
    engine: &Engine,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    let Some(external_id) = model.external_id.clone() else {
        state_machine::fail(model, ErrorCode::ProcessingError)?;
        return Ok(Step::Failed);
    };
    let result = lifecycle::call(
        &engine.config,
        "get_score",
        engine.client.get_score(&external_id),
    )
    .await;

    match result {
        Ok(score) => match (score.status, score.overall_match_percentage) {
            (ScoreStatus::Complete, Some(pct)) => {
                lifecycle::apply_score(model, pct)?;
                Ok(Step::Advanced)
            }
            (ScoreStatus::Complete, None) => {
                let e = ClientError::Malformed {
                    operation: "get_score",
                    detail: "complete score without a percentage".into(),
                };
                Ok(lifecycle::apply_client_failure(model, &e, policy, now)?.into())
            }
            (ScoreStatus::Processing, _) if model.status == SubmissionStatus::Requested => {
                state_machine::transition(model, SubmissionStatus::Processing)?;
                Ok(Step::Advanced)
            }
            _ => Ok(Step::Waiting),
        },
        Err(e) => Ok(lifecycle::apply_client_failure(model, &e, policy, now)?.into()),
    }
}

async fn regenerate(
    engine: &Engine,
    cache: &BatchCache,
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<Step, SubmissionError> {
    if !model.generation_due(now) {
        return Ok(Step::Waiting);
    }
    request_report(engine, cache, model, policy, now).await
}
