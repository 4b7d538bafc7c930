//! Host course-module settings mirrored locally.
//!
//! The host pushes these through the "module updated" event; the engine only
//! needs the module kind, whether checking is enabled, the report generation
//! policy and the due date.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, IntoActiveModel};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "course_modules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub module_kind: ModuleKind,
    pub enabled: bool,
    pub report_generation: ReportGeneration,
    pub due_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[sea_orm(string_value = "assign")]
    Assign,
    #[sea_orm(string_value = "forum")]
    Forum,
    #[sea_orm(string_value = "workshop")]
    Workshop,
    #[sea_orm(string_value = "quiz")]
    Quiz,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleKind::Assign => "assign",
            ModuleKind::Forum => "forum",
            ModuleKind::Workshop => "workshop",
            ModuleKind::Quiz => "quiz",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ModuleKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "assign" => Ok(ModuleKind::Assign),
            "forum" => Ok(ModuleKind::Forum),
            "workshop" => Ok(ModuleKind::Workshop),
            "quiz" => Ok(ModuleKind::Quiz),
            other => Err(format!("invalid ModuleKind: {other}")),
        }
    }
}

/// When similarity reports are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportGeneration {
    #[sea_orm(string_value = "IMMEDIATE")]
    Immediate,
    /// Immediately, and again on the due date.
    #[sea_orm(string_value = "IMMEDIATE_AND_DUE_DATE")]
    ImmediateAndDueDate,
    #[sea_orm(string_value = "DUE_DATE")]
    DueDate,
}

impl fmt::Display for ReportGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportGeneration::Immediate => "IMMEDIATE",
            ReportGeneration::ImmediateAndDueDate => "IMMEDIATE_AND_DUE_DATE",
            ReportGeneration::DueDate => "DUE_DATE",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::similarity_submission::Entity")]
    Submissions,
}

impl Related<super::similarity_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Inserts or replaces the settings of a module.
    pub async fn upsert(
        db: &DatabaseConnection,
        id: i64,
        module_kind: ModuleKind,
        enabled: bool,
        report_generation: ReportGeneration,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        match Entity::find_by_id(id).one(db).await? {
            Some(existing) => {
                let mut am = existing.into_active_model();
                am.module_kind = Set(module_kind);
                am.enabled = Set(enabled);
                am.report_generation = Set(report_generation);
                am.due_date = Set(due_date);
                am.updated_at = Set(now);
                am.update(db).await
            }
            None => {
                ActiveModel {
                    id: Set(id),
                    module_kind: Set(module_kind),
                    enabled: Set(enabled),
                    report_generation: Set(report_generation),
                    due_date: Set(due_date),
                    updated_at: Set(now),
                }
                .insert(db)
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn upsert_replaces_existing_settings() {
        let db = setup_test_db().await;

        let first = Entity::upsert(&db, 42, ModuleKind::Forum, true, ReportGeneration::Immediate, None)
            .await
            .unwrap();
        assert_eq!(first.module_kind, ModuleKind::Forum);

        let due = Utc::now();
        let second = Entity::upsert(
            &db,
            42,
            ModuleKind::Forum,
            false,
            ReportGeneration::DueDate,
            Some(due),
        )
        .await
        .unwrap();
        assert!(!second.enabled);
        assert_eq!(second.report_generation, ReportGeneration::DueDate);

        let all = Entity::find().all(&db).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn module_kind_parses_case_insensitively() {
        assert_eq!("QUIZ".parse::<ModuleKind>(), Ok(ModuleKind::Quiz));
        assert!("page".parse::<ModuleKind>().is_err());
    }
}
