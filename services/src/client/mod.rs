//! Facade over the external similarity service.
//!
//! The engine only talks to the service through [`SimilarityClient`];
//! [`http::HttpSimilarityClient`] is the production implementation and
//! `crate::testing::ScriptedClient` the scripted one used by tests.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::similarity_submission::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpSimilarityClient;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Timeouts, connection failures, 429 and 5xx responses.
    #[error("{operation} failed: {detail}")]
    Transient {
        operation: &'static str,
        detail: String,
    },

    /// The service refused the content itself.
    #[error("remote rejected the submission: {0}")]
    Permanent(ErrorCode),

    #[error("{operation} returned a malformed response: {detail}")]
    Malformed {
        operation: &'static str,
        detail: String,
    },

    #[error("{operation} was not authorized")]
    Unauthorized { operation: &'static str },

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl ClientError {
    /// Whether the call should be retried later. Credential problems count as
    /// transient so work is kept until an operator fixes the key.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transient { .. } | ClientError::Unauthorized { .. } | ClientError::Setup(_)
        )
    }

    pub fn timeout(operation: &'static str) -> Self {
        ClientError::Transient {
            operation,
            detail: "request timed out".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EulaAcceptance {
    pub version: String,
    pub accepted_timestamp: DateTime<Utc>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub course_module_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_submitted_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubmissionRequest {
    pub owner: String,
    pub submitter: String,
    pub title: String,
    pub owner_default_permission_set: String,
    pub submitter_default_permission_set: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eula: Option<EulaAcceptance>,
    pub metadata: SubmissionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedSubmission {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteSubmissionStatus {
    Created,
    Processing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionInfo {
    pub status: RemoteSubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub search_repositories: Vec<String>,
    pub auto_exclude_self_matching_scope: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub generation_settings: GenerationSettings,
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            generation_settings: GenerationSettings {
                search_repositories: ["INTERNET", "SUBMITTED_WORK", "PUBLICATION", "CROSSREF"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                auto_exclude_self_matching_scope: "ALL".into(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreStatus {
    Pending,
    Processing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub status: ScoreStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_match_percentage: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub url: String,
    pub signing_secret: String,
    pub event_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EulaVersionInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Tenant features. The raw document is kept for storage; only the consent
/// flag drives behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct EnabledFeatures {
    pub require_eula: bool,
    pub raw: serde_json::Value,
}

impl EnabledFeatures {
    /// `tenant.require_eula`, defaulting to required when absent.
    pub fn from_value(raw: serde_json::Value) -> Self {
        let require_eula = raw
            .get("tenant")
            .and_then(|t| t.get("require_eula"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Self { require_eula, raw }
    }
}

#[async_trait]
pub trait SimilarityClient: Send + Sync {
    async fn create_submission(
        &self,
        request: &CreateSubmissionRequest,
    ) -> Result<CreatedSubmission, ClientError>;

    async fn upload_original(
        &self,
        external_id: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), ClientError>;

    async fn get_submission_info(&self, external_id: &str) -> Result<SubmissionInfo, ClientError>;

    async fn request_report(
        &self,
        external_id: &str,
        request: &ReportRequest,
    ) -> Result<(), ClientError>;

    async fn get_score(&self, external_id: &str) -> Result<SimilarityScore, ClientError>;

    async fn register_webhook(
        &self,
        request: &WebhookRequest,
    ) -> Result<WebhookRegistration, ClientError>;

    async fn latest_eula(&self) -> Result<EulaVersionInfo, ClientError>;

    async fn enabled_features(&self) -> Result<EnabledFeatures, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn features_default_to_requiring_consent() {
        assert!(EnabledFeatures::from_value(json!({})).require_eula);
        assert!(!EnabledFeatures::from_value(json!({"tenant": {"require_eula": false}})).require_eula);
    }

    #[test]
    fn unauthorized_is_retried_but_permanent_is_not() {
        assert!(ClientError::Unauthorized { operation: "create" }.is_transient());
        assert!(ClientError::timeout("upload").is_transient());
        assert!(!ClientError::Permanent(ErrorCode::CorruptFile).is_transient());
        assert!(
            !ClientError::Malformed {
                operation: "score",
                detail: "x".into()
            }
            .is_transient()
        );
    }
}
