//! Webhook reconciliation.
//!
//! Callbacks race with the dispatch loop. Both sides write through the same
//! versioned commit and the transition rules only move forward, so whichever
//! arrives second either finds nothing left to do or loses the version check.

use crate::cache::BatchCache;
use crate::engine::Engine;
use crate::error::SubmissionError;
use crate::lifecycle;
use crate::state_machine;
use chrono::{DateTime, Utc};
use db::models::similarity_submission::{self, ErrorCode, Model, SubmissionStatus};
use hmac::{Hmac, Mac};
use sea_orm::EntityTrait;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    SubmissionComplete,
    SimilarityComplete,
    SimilarityUpdated,
}

impl EventType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUBMISSION_COMPLETE" => Some(EventType::SubmissionComplete),
            "SIMILARITY_COMPLETE" => Some(EventType::SimilarityComplete),
            "SIMILARITY_UPDATED" => Some(EventType::SimilarityUpdated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SubmissionComplete => "SUBMISSION_COMPLETE",
            EventType::SimilarityComplete => "SIMILARITY_COMPLETE",
            EventType::SimilarityUpdated => "SIMILARITY_UPDATED",
        }
    }

    pub const ALL: [EventType; 3] = [
        EventType::SubmissionComplete,
        EventType::SimilarityComplete,
        EventType::SimilarityUpdated,
    ];
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature rejected")]
    Rejected,

    #[error("malformed webhook: {0}")]
    Malformed(String),

    #[error("no submission with external id {0}")]
    NotFound(String),

    #[error("submission {0} kept changing while applying the webhook")]
    Conflict(i64),

    #[error(transparent)]
    Engine(#[from] SubmissionError),
}

impl From<sea_orm::DbErr> for WebhookError {
    fn from(e: sea_orm::DbErr) -> Self {
        WebhookError::Engine(SubmissionError::Db(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        submission_id: i64,
        status: SubmissionStatus,
    },
    /// Acknowledged without changes (duplicate, late or unsupported event).
    Ignored { reason: String },
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    submission_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    overall_match_percentage: Option<i32>,
}

/// Hex HMAC-SHA256 of `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature against `body`.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Clone)]
pub struct WebhookService {
    engine: Engine,
}

impl WebhookService {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Verifies and applies one callback. Nothing is read or written before the
    /// signature has been checked.
    pub async fn handle(
        &self,
        signature: Option<&str>,
        event_header: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature_ok = signature
            .is_some_and(|sig| verify_signature(&self.engine.config.webhook_secret, body, sig));
        if !signature_ok {
            tracing::warn!(has_signature = signature.is_some(), "rejected webhook with bad signature");
            return Err(WebhookError::Rejected);
        }

        let parsed: WebhookBody =
            serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;

        let raw_event = event_header
            .map(str::to_string)
            .or_else(|| parsed.event_type.clone())
            .ok_or_else(|| WebhookError::Malformed("missing event type".into()))?;
        let Some(event) = EventType::parse(&raw_event) else {
            tracing::info!(event = %raw_event, "ignoring unsupported webhook event");
            return Ok(WebhookOutcome::Ignored {
                reason: format!("unsupported event {raw_event}"),
            });
        };

        let external_id = parsed
            .submission_id
            .clone()
            .or_else(|| parsed.id.clone())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| WebhookError::Malformed("missing submission id".into()))?;

        if matches!(event, EventType::SimilarityComplete | EventType::SimilarityUpdated)
            && parsed.overall_match_percentage.is_none_or(|p| !(0..=100).contains(&p))
        {
            return Err(WebhookError::Malformed(
                "similarity event without a valid overall_match_percentage".into(),
            ));
        }

        let db = &self.engine.db;
        let mut current = similarity_submission::Entity::find_by_external_id(db, &external_id)
            .await?
            .ok_or_else(|| WebhookError::NotFound(external_id.clone()))?;

        // Set once the report request has gone out, so a retry after a lost
        // race does not send it twice.
        let mut report_sent = false;

        // One re-read on a lost race, then give up and let the sender retry.
        for attempt in 0..2 {
            if attempt > 0 {
                current = similarity_submission::Entity::find_by_id(current.id)
                    .one(db)
                    .await?
                    .ok_or_else(|| WebhookError::NotFound(external_id.clone()))?;
            }

            let before = current.status;
            let mut next = current.clone();
            // A worker holding the lease loses its commit on the version check.
            next.lease_until = None;
            let changed = self
                .apply(event, &parsed, &mut next, now, &mut report_sent)
                .await?;
            if !changed {
                tracing::debug!(
                    submission_id = current.id,
                    event = event.as_str(),
                    status = %current.status,
                    "webhook had nothing to change"
                );
                return Ok(WebhookOutcome::Ignored {
                    reason: format!("{} is a no-op in status {}", event.as_str(), current.status),
                });
            }

            if let Some(stored) =
                similarity_submission::Entity::commit(db, next, current.version).await?
            {
                tracing::info!(
                    submission_id = stored.id,
                    external_id = %external_id,
                    event = event.as_str(),
                    from = %before,
                    to = %stored.status,
                    "webhook applied"
                );
                lifecycle::notify_transition(&self.engine, before, &stored).await;
                return Ok(WebhookOutcome::Applied {
                    submission_id: stored.id,
                    status: stored.status,
                });
            }
        }

        tracing::warn!(submission_id = current.id, event = event.as_str(), "webhook lost the version race twice");
        Err(WebhookError::Conflict(current.id))
    }

    async fn apply(
        &self,
        event: EventType,
        body: &WebhookBody,
        model: &mut Model,
        now: DateTime<Utc>,
        report_sent: &mut bool,
    ) -> Result<bool, SubmissionError> {
        match event {
            EventType::SubmissionComplete => {
                self.apply_processed(body, model, now, report_sent).await
            }
            EventType::SimilarityComplete | EventType::SimilarityUpdated => {
                match body.overall_match_percentage {
                    Some(score) => lifecycle::apply_score(model, score),
                    None => Ok(false),
                }
            }
        }
    }

    async fn apply_processed(
        &self,
        body: &WebhookBody,
        model: &mut Model,
        now: DateTime<Utc>,
        report_sent: &mut bool,
    ) -> Result<bool, SubmissionError> {
        if model.status != SubmissionStatus::Uploaded || model.processed_at.is_some() {
            return Ok(false);
        }

        let remote_error = body
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("ERROR"));
        if remote_error {
            let code = body
                .error_code
                .as_deref()
                .map(ErrorCode::from_remote)
                .unwrap_or(ErrorCode::ProcessingError);
            state_machine::fail(model, code)?;
            return Ok(true);
        }

        model.processed_at = Some(now);
        if model.generation_due(now) {
            if !*report_sent {
                match lifecycle::send_report_request(&self.engine, model).await {
                    Ok(()) => *report_sent = true,
                    // The dispatch loop requests the report on its next pass.
                    Err(e) => {
                        tracing::warn!(
                            submission_id = model.id,
                            error = %e,
                            "report request from webhook failed"
                        );
                        return Ok(true);
                    }
                }
            }
            let cache = BatchCache::new();
            let module = cache.module(&self.engine.db, model.course_module_id).await?;
            lifecycle::mark_requested(model, module.as_ref(), now)?;
        }
        Ok(true)
    }
}
