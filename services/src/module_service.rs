//! "Module updated" events from the host.

use crate::error::SubmissionError;
use crate::report_schedule::{self, Schedule};
use chrono::{DateTime, Utc};
use db::models::course_module::{self, ModuleKind, ReportGeneration};
use db::models::similarity_submission;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleUpdate {
    pub module_kind: ModuleKind,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub report_generation: ReportGeneration,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleUpdateOutcome {
    pub module: course_module::Model,
    /// Submissions whose pending report generation moved.
    pub rescheduled: usize,
}

pub struct ModuleService;

impl ModuleService {
    /// Stores the module settings and moves pending report generations that
    /// were tied to the old due date.
    pub async fn update(
        db: &DatabaseConnection,
        course_module_id: i64,
        update: ModuleUpdate,
    ) -> Result<ModuleUpdateOutcome, SubmissionError> {
        let previous = course_module::Entity::find_by_id(course_module_id)
            .one(db)
            .await?;
        let old_due = previous.as_ref().and_then(|m| m.due_date);

        let module = course_module::Entity::upsert(
            db,
            course_module_id,
            update.module_kind,
            update.enabled,
            update.report_generation,
            update.due_date,
        )
        .await?;

        let mut rescheduled = 0;
        if previous.is_some() && old_due != module.due_date {
            for row in
                similarity_submission::Entity::find_scheduled_for_module(db, course_module_id).await?
            {
                let current = Schedule {
                    to_generate: row.to_generate,
                    generation_time: row.generation_time,
                };
                let Some(target) =
                    report_schedule::after_due_date_change(current, old_due, module.due_date)
                else {
                    continue;
                };
                let expected = row.version;
                let id = row.id;
                let mut next = row;
                next.generation_time = Some(target);
                match similarity_submission::Entity::commit(db, next, expected).await? {
                    Some(_) => rescheduled += 1,
                    None => tracing::warn!(submission_id = id, "could not reschedule, row changed concurrently"),
                }
            }
        }

        tracing::info!(
            course_module_id,
            kind = %module.module_kind,
            enabled = module.enabled,
            report_generation = %module.report_generation,
            rescheduled,
            "module settings updated"
        );
        Ok(ModuleUpdateOutcome {
            module,
            rescheduled,
        })
    }
}
