//! Submission lifecycle engine for the similarity-check integration.
//!
//! Everything here is driven through a handful of idempotent entry points
//! (intake, dispatch batch, webhook, maintenance) that an outer scheduler or
//! HTTP layer invokes.

pub mod adapters;
pub mod cache;
pub mod client;
pub mod dispatch_service;
pub mod engine;
pub mod error;
pub mod eula_service;
pub mod lifecycle;
pub mod maintenance_service;
pub mod module_service;
pub mod notifier;
pub mod report_schedule;
pub mod state_machine;
pub mod storage;
pub mod submission_service;
pub mod testing;
pub mod webhook_service;

pub use engine::Engine;
pub use error::SubmissionError;
