//! A piece of student work tracked through the external similarity service.
//!
//! Every write bumps `version`; dispatch workers and webhook handlers use it
//! as a compare-and-swap token so concurrent updates never interleave.

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::NotSet, ActiveValue::Set, Condition, DatabaseConnection, DbErr, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "similarity_submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Remote submission id, present from CREATED onwards.
    pub external_id: Option<String>,
    pub kind: SubmissionKind,
    pub course_module_id: i64,
    pub item_id: Option<i64>,
    pub author_id: i64,
    pub submitter_id: i64,
    pub group_id: Option<i64>,
    /// Hex SHA-256 of the submitted bytes.
    pub identifier: String,
    pub filename: Option<String>,
    pub content_path: Option<String>,
    pub content_size: i64,
    pub status: SubmissionStatus,
    pub error_code: Option<ErrorCode>,
    pub attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub to_generate: bool,
    pub generation_time: Option<DateTime<Utc>>,
    pub requested_at: Option<DateTime<Utc>>,
    pub overall_score: Option<i32>,
    pub version: i64,
    pub lease_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Recorded but not eligible yet (drafts).
    #[sea_orm(string_value = "NOT_SENT")]
    NotSent,
    /// Waiting for the submitter to accept the current EULA.
    #[sea_orm(string_value = "EULA_NOT_ACCEPTED")]
    EulaNotAccepted,
    #[sea_orm(string_value = "QUEUED")]
    Queued,
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "UPLOADED")]
    Uploaded,
    #[sea_orm(string_value = "REQUESTED")]
    Requested,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "COMPLETE")]
    Complete,
    #[sea_orm(string_value = "ERROR")]
    Error,
    /// Nothing to check (empty text or missing file).
    #[sea_orm(string_value = "EMPTY_OR_NO_FILE")]
    EmptyOrNoFile,
}

impl SubmissionStatus {
    /// Statuses the dispatch loop picks up on its own.
    pub const WORKING: [SubmissionStatus; 6] = [
        SubmissionStatus::EulaNotAccepted,
        SubmissionStatus::Queued,
        SubmissionStatus::Created,
        SubmissionStatus::Uploaded,
        SubmissionStatus::Requested,
        SubmissionStatus::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::NotSent => "NOT_SENT",
            SubmissionStatus::EulaNotAccepted => "EULA_NOT_ACCEPTED",
            SubmissionStatus::Queued => "QUEUED",
            SubmissionStatus::Created => "CREATED",
            SubmissionStatus::Uploaded => "UPLOADED",
            SubmissionStatus::Requested => "REQUESTED",
            SubmissionStatus::Processing => "PROCESSING",
            SubmissionStatus::Complete => "COMPLETE",
            SubmissionStatus::Error => "ERROR",
            SubmissionStatus::EmptyOrNoFile => "EMPTY_OR_NO_FILE",
        }
    }

    /// Terminal as far as the dispatch loop is concerned. `ERROR` is not in
    /// this set: it leaves through operator resubmission.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Complete | SubmissionStatus::EmptyOrNoFile
        )
    }

    /// A record that has started talking to the remote service and has not
    /// finished yet.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Created
                | SubmissionStatus::Uploaded
                | SubmissionStatus::Requested
                | SubmissionStatus::Processing
        )
    }

    /// The complete table of legal edges. Self-edges are not transitions and
    /// are rejected, except `NOT_SENT` which may be re-evaluated as a draft.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        match (self, next) {
            (NotSent, NotSent | EulaNotAccepted | Queued | EmptyOrNoFile | Error) => true,
            (EulaNotAccepted, Queued) => true,
            (Queued, EulaNotAccepted | Created | Error) => true,
            (Created, Uploaded | Error) => true,
            (Uploaded, Requested | Error) => true,
            (Requested, Processing | Complete | Error) => true,
            (Processing, Complete | Error) => true,
            (Complete, Requested | Queued) => true,
            (Error, Queued) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    #[sea_orm(string_value = "file")]
    File,
    #[sea_orm(string_value = "content")]
    Content,
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionKind::File => "file",
            SubmissionKind::Content => "content",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[sea_orm(string_value = "TOO_LARGE")]
    TooLarge,
    #[sea_orm(string_value = "TOO_MANY_PAGES")]
    TooManyPages,
    #[sea_orm(string_value = "UNSUPPORTED_FILETYPE")]
    UnsupportedFiletype,
    #[sea_orm(string_value = "CORRUPT_FILE")]
    CorruptFile,
    #[sea_orm(string_value = "CANNOT_EXTRACT_TEXT")]
    CannotExtractText,
    #[sea_orm(string_value = "TOO_LITTLE_TEXT")]
    TooLittleText,
    #[sea_orm(string_value = "TOO_MUCH_TEXT")]
    TooMuchText,
    #[sea_orm(string_value = "PROCESSING_ERROR")]
    ProcessingError,
    #[sea_orm(string_value = "FILE_LOCKED")]
    FileLocked,
    #[sea_orm(string_value = "MALFORMED_RESPONSE")]
    MalformedResponse,
    #[sea_orm(string_value = "TOO_MANY_ATTEMPTS")]
    TooManyAttempts,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TooLarge => "TOO_LARGE",
            ErrorCode::TooManyPages => "TOO_MANY_PAGES",
            ErrorCode::UnsupportedFiletype => "UNSUPPORTED_FILETYPE",
            ErrorCode::CorruptFile => "CORRUPT_FILE",
            ErrorCode::CannotExtractText => "CANNOT_EXTRACT_TEXT",
            ErrorCode::TooLittleText => "TOO_LITTLE_TEXT",
            ErrorCode::TooMuchText => "TOO_MUCH_TEXT",
            ErrorCode::ProcessingError => "PROCESSING_ERROR",
            ErrorCode::FileLocked => "FILE_LOCKED",
            ErrorCode::MalformedResponse => "MALFORMED_RESPONSE",
            ErrorCode::TooManyAttempts => "TOO_MANY_ATTEMPTS",
        }
    }

    /// Reason shown to students and teachers next to an `ERROR` status.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::TooLarge => "The file is larger than the similarity service accepts.",
            ErrorCode::TooManyPages => "The file has too many pages to be checked.",
            ErrorCode::UnsupportedFiletype => "This file type is not supported.",
            ErrorCode::CorruptFile => "The file appears to be corrupt.",
            ErrorCode::CannotExtractText => "No text could be extracted from the file.",
            ErrorCode::TooLittleText => "The submission does not contain enough text to check.",
            ErrorCode::TooMuchText => "The submission contains too much text to check.",
            ErrorCode::ProcessingError => "The similarity service could not process the submission.",
            ErrorCode::FileLocked => "The file is password protected.",
            ErrorCode::MalformedResponse => {
                "The similarity service returned a response that could not be understood."
            }
            ErrorCode::TooManyAttempts => {
                "The submission could not be sent after repeated attempts."
            }
        }
    }

    /// Maps a remote `error_code` string. Unknown codes fall back to a generic
    /// processing error.
    pub fn from_remote(code: &str) -> ErrorCode {
        match code.trim().to_ascii_uppercase().as_str() {
            "TOO_LARGE" | "FILE_TOO_LARGE" => ErrorCode::TooLarge,
            "TOO_MANY_PAGES" | "PAGE_LIMIT" => ErrorCode::TooManyPages,
            "UNSUPPORTED_FILETYPE" => ErrorCode::UnsupportedFiletype,
            "CORRUPT_FILE" => ErrorCode::CorruptFile,
            "CANNOT_EXTRACT_TEXT" => ErrorCode::CannotExtractText,
            "TOO_LITTLE_TEXT" => ErrorCode::TooLittleText,
            "TOO_MUCH_TEXT" => ErrorCode::TooMuchText,
            "FILE_LOCKED" => ErrorCode::FileLocked,
            _ => ErrorCode::ProcessingError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course_module::Entity",
        from = "Column::CourseModuleId",
        to = "super::course_module::Column::Id",
        on_delete = "Cascade"
    )]
    CourseModule,
}

impl Related<super::course_module::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseModule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fields supplied by intake for a record that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub kind: SubmissionKind,
    pub course_module_id: i64,
    pub item_id: Option<i64>,
    pub author_id: i64,
    pub submitter_id: i64,
    pub group_id: Option<i64>,
    pub identifier: String,
    pub filename: Option<String>,
    pub content_path: Option<String>,
    pub content_size: i64,
    pub status: SubmissionStatus,
    pub error_code: Option<ErrorCode>,
    pub submitted_at: DateTime<Utc>,
    pub to_generate: bool,
    pub generation_time: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.lease_until.is_some_and(|until| until >= now)
    }

    /// Whether the scheduled report generation is due.
    pub fn generation_due(&self, now: DateTime<Utc>) -> bool {
        self.to_generate && self.generation_time.is_none_or(|at| at <= now)
    }

    /// Full-row update carrying every mutable column. `id` stays unset so
    /// the statement can be used with `update_many`.
    fn into_versioned_update(self, version: i64, now: DateTime<Utc>) -> ActiveModel {
        ActiveModel {
            id: NotSet,
            external_id: Set(self.external_id),
            kind: Set(self.kind),
            course_module_id: Set(self.course_module_id),
            item_id: Set(self.item_id),
            author_id: Set(self.author_id),
            submitter_id: Set(self.submitter_id),
            group_id: Set(self.group_id),
            identifier: Set(self.identifier),
            filename: Set(self.filename),
            content_path: Set(self.content_path),
            content_size: Set(self.content_size),
            status: Set(self.status),
            error_code: Set(self.error_code),
            attempts: Set(self.attempts),
            next_retry_at: Set(self.next_retry_at),
            submitted_at: Set(self.submitted_at),
            processed_at: Set(self.processed_at),
            to_generate: Set(self.to_generate),
            generation_time: Set(self.generation_time),
            requested_at: Set(self.requested_at),
            overall_score: Set(self.overall_score),
            version: Set(version),
            lease_until: Set(self.lease_until),
            created_at: NotSet,
            updated_at: Set(now),
        }
    }
}

fn nullable_eq(column: Column, value: Option<i64>) -> Condition {
    match value {
        Some(v) => Condition::all().add(column.eq(v)),
        None => Condition::all().add(column.is_null()),
    }
}

fn lease_free(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(Column::LeaseUntil.is_null())
        .add(Column::LeaseUntil.lt(now))
}

impl Entity {
    pub async fn insert_new(db: &DatabaseConnection, new: NewSubmission) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            external_id: Set(None),
            kind: Set(new.kind),
            course_module_id: Set(new.course_module_id),
            item_id: Set(new.item_id),
            author_id: Set(new.author_id),
            submitter_id: Set(new.submitter_id),
            group_id: Set(new.group_id),
            identifier: Set(new.identifier),
            filename: Set(new.filename),
            content_path: Set(new.content_path),
            content_size: Set(new.content_size),
            status: Set(new.status),
            error_code: Set(new.error_code),
            attempts: Set(0),
            next_retry_at: Set(None),
            submitted_at: Set(Some(new.submitted_at)),
            processed_at: Set(None),
            to_generate: Set(new.to_generate),
            generation_time: Set(new.generation_time),
            requested_at: Set(None),
            overall_score: Set(None),
            version: Set(0),
            lease_until: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    /// The record for "the same piece of work", if one exists.
    pub async fn find_same_work(
        db: &DatabaseConnection,
        identifier: &str,
        author_id: i64,
        course_module_id: i64,
        item_id: Option<i64>,
        group_id: Option<i64>,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::Identifier.eq(identifier))
            .filter(Column::AuthorId.eq(author_id))
            .filter(Column::CourseModuleId.eq(course_module_id))
            .filter(nullable_eq(Column::ItemId, item_id))
            .filter(nullable_eq(Column::GroupId, group_id))
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    pub async fn find_by_external_id(
        db: &DatabaseConnection,
        external_id: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ExternalId.eq(external_id))
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    /// Records the dispatch loop should look at, oldest first.
    ///
    /// `UPLOADED` rows that are already processed only qualify once their
    /// report generation is due, and `COMPLETE` rows only for a scheduled
    /// regeneration.
    pub async fn find_dispatchable(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Model>, DbErr> {
        let retry_due = Condition::any()
            .add(Column::NextRetryAt.is_null())
            .add(Column::NextRetryAt.lte(now));

        let generation_due = Condition::all()
            .add(Column::ToGenerate.eq(true))
            .add(
                Condition::any()
                    .add(Column::GenerationTime.is_null())
                    .add(Column::GenerationTime.lte(now)),
            );

        let working = Condition::all()
            .add(Column::Status.is_in([
                SubmissionStatus::EulaNotAccepted,
                SubmissionStatus::Queued,
                SubmissionStatus::Created,
                SubmissionStatus::Requested,
                SubmissionStatus::Processing,
            ]))
            .add(retry_due.clone());

        let uploaded = Condition::all()
            .add(Column::Status.eq(SubmissionStatus::Uploaded))
            .add(retry_due)
            .add(
                Condition::any()
                    .add(Column::ProcessedAt.is_null())
                    .add(generation_due.clone()),
            );

        let regeneration = Condition::all()
            .add(Column::Status.eq(SubmissionStatus::Complete))
            .add(generation_due);

        Entity::find()
            .filter(
                Condition::any()
                    .add(working)
                    .add(uploaded)
                    .add(regeneration),
            )
            .filter(lease_free(now))
            .order_by_asc(Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    /// Takes the dispatch lease on `model`. Returns the leased row, or `None`
    /// when another writer got there first.
    pub async fn claim(
        db: &DatabaseConnection,
        model: &Model,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<Model>, DbErr> {
        let until = now + lease;
        let result = Entity::update_many()
            .col_expr(Column::LeaseUntil, Expr::value(until))
            .col_expr(Column::Version, Expr::value(model.version + 1))
            .filter(Column::Id.eq(model.id))
            .filter(Column::Version.eq(model.version))
            .filter(lease_free(now))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        let mut claimed = model.clone();
        claimed.lease_until = Some(until);
        claimed.version += 1;
        Ok(Some(claimed))
    }

    /// Writes `updated` if the stored row is still at `expected_version`.
    /// Returns the stored row, or `None` on a version conflict.
    pub async fn commit(
        db: &DatabaseConnection,
        updated: Model,
        expected_version: i64,
    ) -> Result<Option<Model>, DbErr> {
        let id = updated.id;
        let now = Utc::now();
        let mut stored = updated.clone();
        stored.version = expected_version + 1;
        stored.updated_at = now;

        let result = Entity::update_many()
            .set(updated.into_versioned_update(expected_version + 1, now))
            .filter(Column::Id.eq(id))
            .filter(Column::Version.eq(expected_version))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            Ok(None)
        } else {
            Ok(Some(stored))
        }
    }

    /// Drops a lease without touching anything else.
    pub async fn release(db: &DatabaseConnection, model: &Model) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .col_expr(Column::LeaseUntil, Expr::value(Option::<DateTime<Utc>>::None))
            .col_expr(Column::Version, Expr::value(model.version + 1))
            .filter(Column::Id.eq(model.id))
            .filter(Column::Version.eq(model.version))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Records of `user_id` still waiting on consent.
    pub async fn find_gated_for_user(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubmitterId.eq(user_id))
            .filter(Column::Status.eq(SubmissionStatus::EulaNotAccepted))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Records of a module with a pending report generation.
    pub async fn find_scheduled_for_module(
        db: &DatabaseConnection,
        course_module_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::CourseModuleId.eq(course_module_id))
            .filter(Column::ToGenerate.eq(true))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
