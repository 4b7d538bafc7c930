use crate::client::ClientError;
use db::models::similarity_submission::SubmissionStatus;
use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by the engine's entry points.
///
/// Remote failures normally never surface here: they are folded into the
/// submission's status and retry bookkeeping. `Client` only appears for
/// maintenance calls that have no submission to record the failure on.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("submission {0} not found")]
    NotFound(i64),

    #[error("course module {0} is not known")]
    ModuleNotFound(i64),

    #[error("submission {0} was modified concurrently")]
    Conflict(i64),

    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("content storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid intake event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}
