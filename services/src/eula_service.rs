//! Consent gate: a submission only leaves the engine once its submitter has
//! accepted the currently published EULA.

use crate::error::SubmissionError;
use crate::state_machine;
use chrono::{DateTime, Utc};
use db::models::service_setting::{self, LATEST_EULA_VERSION, REQUIRE_EULA};
use db::models::similarity_submission::{self, SubmissionStatus};
use db::models::user_eula;
use sea_orm::{DatabaseConnection, DbErr};
use std::cmp::Ordering;

/// What the service currently demands from users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequirement {
    pub required: bool,
    /// Latest published version; `None` until the settings refresh has run.
    pub version: Option<String>,
}

impl ConsentRequirement {
    pub fn not_required() -> Self {
        Self {
            required: false,
            version: None,
        }
    }

    pub fn version(version: &str) -> Self {
        Self {
            required: true,
            version: Some(version.to_string()),
        }
    }
}

fn numeric_parts(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Orders two EULA versions by their dotted numeric components (`v1.2` <
/// `v1.10`). Versions without digits are only comparable for equality.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let (pa, pb) = (numeric_parts(a), numeric_parts(b));
    if pa.is_empty() || pb.is_empty() {
        return (a.trim() == b.trim()).then_some(Ordering::Equal);
    }
    let len = pa.len().max(pb.len());
    for i in 0..len {
        let x = pa.get(i).copied().unwrap_or(0);
        let y = pb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

/// Pure gate check. An unknown published version keeps everyone gated while
/// consent is required.
pub fn may_proceed(record: Option<&user_eula::Model>, requirement: &ConsentRequirement) -> bool {
    if !requirement.required {
        return true;
    }
    let (Some(required), Some(record)) = (requirement.version.as_deref(), record) else {
        return false;
    };
    matches!(
        compare_versions(&record.accepted_version, required),
        Some(Ordering::Equal | Ordering::Greater)
    )
}

#[derive(Debug, Clone)]
pub struct AcceptanceOutcome {
    pub record: user_eula::Model,
    /// Submissions moved from `EULA_NOT_ACCEPTED` to `QUEUED`.
    pub released: Vec<i64>,
}

pub struct EulaService;

impl EulaService {
    /// Requirement as last stored by the settings refresh.
    pub async fn published_requirement(
        db: &DatabaseConnection,
    ) -> Result<ConsentRequirement, DbErr> {
        let required = service_setting::Entity::get(db, REQUIRE_EULA)
            .await?
            .map(|v| v != "false")
            .unwrap_or(true);
        let version = service_setting::Entity::get(db, LATEST_EULA_VERSION).await?;
        Ok(ConsentRequirement { required, version })
    }

    /// Stores the acceptance and releases the user's gated submissions that
    /// now pass the gate.
    pub async fn record_acceptance(
        db: &DatabaseConnection,
        user_id: i64,
        version: &str,
        locale: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<AcceptanceOutcome, SubmissionError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(SubmissionError::InvalidEvent("empty EULA version".into()));
        }

        let record =
            user_eula::Entity::upsert_acceptance(db, user_id, version, locale, accepted_at).await?;
        tracing::info!(user_id, version, "EULA accepted");

        let requirement = Self::published_requirement(db).await?;
        let mut released = Vec::new();
        if may_proceed(Some(&record), &requirement) {
            for gated in similarity_submission::Entity::find_gated_for_user(db, user_id).await? {
                let expected = gated.version;
                let mut next = gated;
                state_machine::transition(&mut next, SubmissionStatus::Queued)?;
                let id = next.id;
                match similarity_submission::Entity::commit(db, next, expected).await? {
                    Some(_) => released.push(id),
                    // The dispatch loop re-checks the gate for anything we lose here.
                    None => tracing::debug!(submission_id = id, "gated submission changed concurrently"),
                }
            }
        }

        if !released.is_empty() {
            tracing::info!(user_id, count = released.len(), "released gated submissions");
        }
        Ok(AcceptanceOutcome { record, released })
    }
}
