//! Status changes applied to an in-memory submission row.
//!
//! Nothing here touches the database; callers commit the mutated row with a
//! version check afterwards.

use crate::error::SubmissionError;
use chrono::{DateTime, Duration, Utc};
use db::models::similarity_submission::{ErrorCode, Model, SubmissionStatus};
use util::config::PluginConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            max_attempts: config.max_send_attempts,
            backoff: config.retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Status unchanged, eligible again at the given time.
    Scheduled(DateTime<Utc>),
    /// Moved to `ERROR(TOO_MANY_ATTEMPTS)`.
    Exhausted,
}

/// Moves `model` along a legal edge. Leaving `ERROR` clears the error code and
/// any pending retry time goes away with the old status.
pub fn transition(model: &mut Model, next: SubmissionStatus) -> Result<(), SubmissionError> {
    if !model.status.can_transition_to(next) {
        return Err(SubmissionError::InvalidTransition {
            from: model.status,
            to: next,
        });
    }
    model.status = next;
    model.next_retry_at = None;
    if next != SubmissionStatus::Error {
        model.error_code = None;
    }
    Ok(())
}

pub fn fail(model: &mut Model, code: ErrorCode) -> Result<(), SubmissionError> {
    transition(model, SubmissionStatus::Error)?;
    model.error_code = Some(code);
    Ok(())
}

/// Counts a retryable failure against the record.
pub fn record_transient_failure(
    model: &mut Model,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<RetryOutcome, SubmissionError> {
    model.attempts += 1;
    if model.attempts >= policy.max_attempts {
        fail(model, ErrorCode::TooManyAttempts)?;
        return Ok(RetryOutcome::Exhausted);
    }
    let at = now + policy.backoff;
    model.next_retry_at = Some(at);
    Ok(RetryOutcome::Scheduled(at))
}

/// Starts a fresh lifecycle pass: everything tied to the previous remote
/// submission is dropped, including the attempt counter.
pub fn start_new_pass(
    model: &mut Model,
    status: SubmissionStatus,
    now: DateTime<Utc>,
) -> Result<(), SubmissionError> {
    transition(model, status)?;
    model.external_id = None;
    model.error_code = None;
    model.attempts = 0;
    model.next_retry_at = None;
    model.processed_at = None;
    model.requested_at = None;
    model.overall_score = None;
    model.submitted_at = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::similarity_submission::SubmissionKind;

    fn row(status: SubmissionStatus) -> Model {
        let now = Utc::now();
        Model {
            id: 1,
            external_id: None,
            kind: SubmissionKind::File,
            course_module_id: 1,
            item_id: None,
            author_id: 2,
            submitter_id: 2,
            group_id: None,
            identifier: "abc".into(),
            filename: None,
            content_path: None,
            content_size: 1,
            status,
            error_code: None,
            attempts: 0,
            next_retry_at: None,
            submitted_at: Some(now),
            processed_at: None,
            to_generate: false,
            generation_time: None,
            requested_at: None,
            overall_score: None,
            version: 0,
            lease_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 12,
            backoff: Duration::hours(1),
        }
    }

    #[test]
    fn illegal_edge_leaves_row_untouched() {
        let mut m = row(SubmissionStatus::Queued);
        let err = transition(&mut m, SubmissionStatus::Complete).unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidTransition { .. }));
        assert_eq!(m.status, SubmissionStatus::Queued);
    }

    #[test]
    fn transient_failures_back_off_then_exhaust() {
        let mut m = row(SubmissionStatus::Queued);
        let now = Utc::now();

        for attempt in 1..12 {
            let outcome = record_transient_failure(&mut m, &policy(), now).unwrap();
            assert_eq!(outcome, RetryOutcome::Scheduled(now + Duration::hours(1)));
            assert_eq!(m.attempts, attempt);
            assert_eq!(m.status, SubmissionStatus::Queued);
        }

        let outcome = record_transient_failure(&mut m, &policy(), now).unwrap();
        assert_eq!(outcome, RetryOutcome::Exhausted);
        assert_eq!(m.status, SubmissionStatus::Error);
        assert_eq!(m.error_code, Some(ErrorCode::TooManyAttempts));
        assert_eq!(m.attempts, 12);
        assert!(m.next_retry_at.is_none());
    }

    #[test]
    fn success_keeps_attempt_counter() {
        let mut m = row(SubmissionStatus::Queued);
        record_transient_failure(&mut m, &policy(), Utc::now()).unwrap();
        transition(&mut m, SubmissionStatus::Created).unwrap();
        assert_eq!(m.attempts, 1);
        assert!(m.next_retry_at.is_none());
    }

    #[test]
    fn new_pass_clears_remote_state() {
        let mut m = row(SubmissionStatus::Error);
        m.external_id = Some("ext".into());
        m.error_code = Some(ErrorCode::TooManyAttempts);
        m.attempts = 12;
        m.overall_score = Some(10);

        let now = Utc::now();
        start_new_pass(&mut m, SubmissionStatus::Queued, now).unwrap();
        assert_eq!(m.status, SubmissionStatus::Queued);
        assert!(m.external_id.is_none());
        assert!(m.error_code.is_none());
        assert_eq!(m.attempts, 0);
        assert!(m.overall_score.is_none());
        assert_eq!(m.submitted_at, Some(now));
    }

    #[test]
    fn empty_records_cannot_restart() {
        let mut m = row(SubmissionStatus::EmptyOrNoFile);
        assert!(start_new_pass(&mut m, SubmissionStatus::Queued, Utc::now()).is_err());
    }
}
