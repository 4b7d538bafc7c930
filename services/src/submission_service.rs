//! Intake of host submission events, operator resubmission and the status
//! view shown next to a submission.

use crate::adapters::{ItemContext, adapter_for};
use crate::cache::BatchCache;
use crate::engine::Engine;
use crate::error::SubmissionError;
use crate::eula_service;
use crate::lifecycle;
use crate::report_schedule::{self, Schedule};
use crate::state_machine;
use crate::storage::content_identifier;
use chrono::{DateTime, Utc};
use db::models::course_module;
use db::models::similarity_submission::{
    self, ErrorCode, Model, NewSubmission, SubmissionKind, SubmissionStatus,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

/// A host event saying a piece of work was submitted or changed.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeEvent {
    pub course_module_id: i64,
    #[serde(default)]
    pub item_id: Option<i64>,
    pub kind: SubmissionKind,
    #[serde(flatten)]
    pub item: ItemContext,
    #[serde(default)]
    pub filename: Option<String>,
    /// Inline text for `content` submissions.
    #[serde(default)]
    pub text: Option<String>,
    /// When the host last modified the content.
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeOutcome {
    Created,
    /// An existing record started a new pass with modified content.
    Requeued,
    /// An existing record was evaluated again (gate or draft).
    Regated,
    Unchanged,
    /// Checking is disabled for the module.
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeReceipt {
    pub outcome: IntakeOutcome,
    pub submission: Option<Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub id: i64,
    pub status: SubmissionStatus,
    pub error_code: Option<ErrorCode>,
    pub reason: Option<String>,
    pub overall_score: Option<i32>,
    pub external_id: Option<String>,
    pub attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub show_other_posts_links: bool,
}

/// Where a piece of content enters the lifecycle.
fn entry_status(
    draft: bool,
    size: u64,
    max_size: u64,
    gate_open: bool,
) -> (SubmissionStatus, Option<ErrorCode>) {
    if draft {
        (SubmissionStatus::NotSent, None)
    } else if size == 0 {
        (SubmissionStatus::EmptyOrNoFile, None)
    } else if size > max_size {
        (SubmissionStatus::Error, Some(ErrorCode::TooLarge))
    } else if !gate_open {
        (SubmissionStatus::EulaNotAccepted, None)
    } else {
        (SubmissionStatus::Queued, None)
    }
}

#[derive(Clone)]
pub struct SubmissionService {
    engine: Engine,
}

impl SubmissionService {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Decides what a host submission event means for the engine. Calling it
    /// again with the same event is a no-op.
    pub async fn intake(
        &self,
        event: IntakeEvent,
        file: Option<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Result<IntakeReceipt, SubmissionError> {
        let db = &self.engine.db;
        let cache = BatchCache::new();

        let module = cache
            .module(db, event.course_module_id)
            .await?
            .ok_or(SubmissionError::ModuleNotFound(event.course_module_id))?;
        if !module.enabled {
            tracing::debug!(course_module_id = module.id, "checking disabled, ignoring submission");
            return Ok(IntakeReceipt {
                outcome: IntakeOutcome::Ignored,
                submission: None,
            });
        }

        let content = match event.kind {
            SubmissionKind::File => file.unwrap_or_default(),
            SubmissionKind::Content => event.text.clone().unwrap_or_default().into_bytes(),
        };
        if event.kind == SubmissionKind::File && event.filename.is_none() && !content.is_empty() {
            return Err(SubmissionError::InvalidEvent("file submission without filename".into()));
        }

        let adapter = adapter_for(module.module_kind);
        let author_id = adapter.author(&event.item);
        let group_id = adapter.group_id(&event.item);
        let draft = adapter.is_draft(&event.item);
        let due = adapter.due_date(&module, &event.item);
        let identifier = content_identifier(&content);
        let size = content.len() as u64;

        let requirement = cache.requirement(db).await?;
        let consent = cache.consent(db, event.item.submitter_id).await?;
        let gate_open = eula_service::may_proceed(consent.as_ref(), &requirement);
        let (status, error_code) =
            entry_status(draft, size, self.engine.config.max_file_size, gate_open);

        let existing = similarity_submission::Entity::find_same_work(
            db,
            &identifier,
            author_id,
            module.id,
            event.item_id,
            group_id,
        )
        .await?;

        let Some(existing) = existing else {
            let content_path = if status == SubmissionStatus::EmptyOrNoFile
                || error_code == Some(ErrorCode::TooLarge)
            {
                None
            } else {
                Some(
                    self.engine
                        .store
                        .write(module.id, author_id, &identifier, &content)
                        .await?,
                )
            };
            let schedule = report_schedule::initial(module.report_generation, due, now);
            let created = similarity_submission::Entity::insert_new(
                db,
                NewSubmission {
                    kind: event.kind,
                    course_module_id: module.id,
                    item_id: event.item_id,
                    author_id,
                    submitter_id: event.item.submitter_id,
                    group_id,
                    identifier,
                    filename: event.filename.clone(),
                    content_path,
                    content_size: size as i64,
                    status,
                    error_code,
                    submitted_at: now,
                    to_generate: schedule.to_generate,
                    generation_time: schedule.generation_time,
                },
            )
            .await?;

            tracing::info!(
                submission_id = created.id,
                course_module_id = created.course_module_id,
                author_id,
                status = %created.status,
                "submission recorded"
            );
            lifecycle::notify_transition(&self.engine, SubmissionStatus::NotSent, &created).await;
            return Ok(IntakeReceipt {
                outcome: IntakeOutcome::Created,
                submission: Some(created),
            });
        };

        let before = existing.status;
        let expected = existing.version;
        let mut next = existing.clone();
        let outcome = match existing.status {
            SubmissionStatus::Complete => {
                let modified = match (event.modified_at, existing.submitted_at) {
                    (Some(modified), Some(submitted)) => modified > submitted,
                    _ => false,
                };
                if !modified {
                    IntakeOutcome::Unchanged
                } else {
                    state_machine::start_new_pass(&mut next, SubmissionStatus::Queued, now)?;
                    next.content_path = Some(
                        self.engine
                            .store
                            .write(module.id, author_id, &next.identifier, &content)
                            .await?,
                    );
                    apply_schedule(&mut next, report_schedule::initial(module.report_generation, due, now));
                    IntakeOutcome::Requeued
                }
            }
            SubmissionStatus::EulaNotAccepted if gate_open => {
                state_machine::transition(&mut next, SubmissionStatus::Queued)?;
                IntakeOutcome::Regated
            }
            SubmissionStatus::NotSent if status != SubmissionStatus::NotSent => {
                state_machine::transition(&mut next, status)?;
                next.error_code = error_code;
                next.submitted_at = Some(now);
                if status == SubmissionStatus::Error {
                    next.content_path = None;
                }
                apply_schedule(&mut next, report_schedule::initial(module.report_generation, due, now));
                IntakeOutcome::Regated
            }
            _ => IntakeOutcome::Unchanged,
        };

        if outcome == IntakeOutcome::Unchanged {
            tracing::debug!(submission_id = existing.id, status = %existing.status, "submission unchanged");
            return Ok(IntakeReceipt {
                outcome,
                submission: Some(existing),
            });
        }

        let stored = similarity_submission::Entity::commit(db, next, expected)
            .await?
            .ok_or(SubmissionError::Conflict(existing.id))?;
        tracing::info!(
            submission_id = stored.id,
            from = %before,
            to = %stored.status,
            outcome = ?outcome,
            "submission re-evaluated"
        );
        lifecycle::notify_transition(&self.engine, before, &stored).await;
        Ok(IntakeReceipt {
            outcome,
            submission: Some(stored),
        })
    }

    /// Operator resubmission of a failed record: starts a new pass from `QUEUED`.
    pub async fn resubmit(&self, id: i64, now: DateTime<Utc>) -> Result<Model, SubmissionError> {
        let db = &self.engine.db;
        let existing = similarity_submission::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(SubmissionError::NotFound(id))?;
        if existing.status != SubmissionStatus::Error {
            return Err(SubmissionError::InvalidTransition {
                from: existing.status,
                to: SubmissionStatus::Queued,
            });
        }

        let expected = existing.version;
        let mut next = existing.clone();
        state_machine::start_new_pass(&mut next, SubmissionStatus::Queued, now)?;
        next.lease_until = None;

        let module = course_module::Entity::find_by_id(existing.course_module_id)
            .one(db)
            .await?;
        let schedule = match &module {
            Some(m) => report_schedule::initial(m.report_generation, m.due_date, now),
            None => Schedule::none(),
        };
        apply_schedule(&mut next, schedule);

        let stored = similarity_submission::Entity::commit(db, next, expected)
            .await?
            .ok_or(SubmissionError::Conflict(id))?;
        tracing::info!(
            submission_id = id,
            previous_error = ?existing.error_code,
            previous_attempts = existing.attempts,
            "submission resubmitted"
        );
        Ok(stored)
    }

    pub async fn status_view(&self, id: i64) -> Result<StatusView, SubmissionError> {
        let db = &self.engine.db;
        let model = similarity_submission::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(SubmissionError::NotFound(id))?;
        let module = course_module::Entity::find_by_id(model.course_module_id)
            .one(db)
            .await?;
        let show_other_posts_links = module
            .map(|m| adapter_for(m.module_kind).show_other_posts_links())
            .unwrap_or(false);

        let reason = match model.status {
            SubmissionStatus::Error => model.error_code.map(|c| c.description().to_string()),
            SubmissionStatus::EulaNotAccepted => {
                Some("The submitter has not accepted the current EULA.".to_string())
            }
            SubmissionStatus::EmptyOrNoFile => {
                Some("The submission has no content to check.".to_string())
            }
            _ => None,
        };

        Ok(StatusView {
            id: model.id,
            status: model.status,
            error_code: model.error_code,
            reason,
            overall_score: model.overall_score,
            external_id: model.external_id,
            attempts: model.attempts,
            next_retry_at: model.next_retry_at,
            submitted_at: model.submitted_at,
            show_other_posts_links,
        })
    }
}

fn apply_schedule(model: &mut Model, schedule: Schedule) {
    model.to_generate = schedule.to_generate;
    model.generation_time = schedule.generation_time;
}
