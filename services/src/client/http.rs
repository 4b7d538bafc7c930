use super::{
    ClientError, CreateSubmissionRequest, CreatedSubmission, EnabledFeatures, EulaVersionInfo,
    ReportRequest, SimilarityClient, SimilarityScore, SubmissionInfo, WebhookRegistration,
    WebhookRequest,
};
use async_trait::async_trait;
use db::models::similarity_submission::ErrorCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use util::config::PluginConfig;

#[derive(Debug, Deserialize)]
struct RemoteError {
    error_code: Option<String>,
}

/// REST implementation of [`SimilarityClient`].
#[derive(Clone)]
pub struct HttpSimilarityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSimilarityClient {
    pub fn new(config: &PluginConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| ClientError::Setup(format!("invalid api key header: {e}")))?;
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            "X-Integration-Name",
            HeaderValue::from_str(&config.integration_name)
                .map_err(|e| ClientError::Setup(format!("invalid integration name: {e}")))?,
        );
        headers.insert(
            "X-Integration-Version",
            HeaderValue::from_str(&config.integration_version)
                .map_err(|e| ClientError::Setup(format!("invalid integration version: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| ClientError::Transient {
            operation,
            detail: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::debug!(operation, status = %status, "similarity service returned an error status");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ClientError::Unauthorized { operation })
            }
            StatusCode::PAYLOAD_TOO_LARGE => Err(ClientError::Permanent(ErrorCode::TooLarge)),
            StatusCode::TOO_MANY_REQUESTS => Err(ClientError::Transient {
                operation,
                detail: "rate limited".into(),
            }),
            s if s.is_server_error() => Err(ClientError::Transient {
                operation,
                detail: format!("HTTP {s}"),
            }),
            s => {
                let body = response.text().await.unwrap_or_default();
                match serde_json::from_str::<RemoteError>(&body) {
                    Ok(RemoteError {
                        error_code: Some(code),
                    }) => Err(ClientError::Permanent(ErrorCode::from_remote(&code))),
                    _ => Err(ClientError::Malformed {
                        operation,
                        detail: format!("HTTP {s}: {body}"),
                    }),
                }
            }
        }
    }

    async fn json<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, ClientError> {
        let bytes = response.bytes().await.map_err(|e| ClientError::Transient {
            operation,
            detail: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Malformed {
            operation,
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl SimilarityClient for HttpSimilarityClient {
    async fn create_submission(
        &self,
        request: &CreateSubmissionRequest,
    ) -> Result<CreatedSubmission, ClientError> {
        const OP: &str = "create_submission";
        let response = self
            .send(OP, self.http.post(self.url("/submissions")).json(request))
            .await?;
        let created: CreatedSubmission = Self::json(OP, response).await?;
        if created.id.trim().is_empty() {
            return Err(ClientError::Malformed {
                operation: OP,
                detail: "empty submission id".into(),
            });
        }
        Ok(created)
    }

    async fn upload_original(
        &self,
        external_id: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), ClientError> {
        let disposition = format!("inline; filename=\"{}\"", filename.replace('"', "_"));
        let request = self
            .http
            .put(self.url(&format!("/submissions/{external_id}/original")))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(content);
        self.send("upload_original", request).await?;
        Ok(())
    }

    async fn get_submission_info(&self, external_id: &str) -> Result<SubmissionInfo, ClientError> {
        const OP: &str = "get_submission_info";
        let response = self
            .send(OP, self.http.get(self.url(&format!("/submissions/{external_id}"))))
            .await?;
        Self::json(OP, response).await
    }

    async fn request_report(
        &self,
        external_id: &str,
        request: &ReportRequest,
    ) -> Result<(), ClientError> {
        let builder = self
            .http
            .put(self.url(&format!("/submissions/{external_id}/similarity")))
            .json(request);
        self.send("request_report", builder).await?;
        Ok(())
    }

    async fn get_score(&self, external_id: &str) -> Result<SimilarityScore, ClientError> {
        const OP: &str = "get_score";
        let response = self
            .send(
                OP,
                self.http
                    .get(self.url(&format!("/submissions/{external_id}/similarity"))),
            )
            .await?;
        let score: SimilarityScore = Self::json(OP, response).await?;
        if let Some(pct) = score.overall_match_percentage {
            if !(0..=100).contains(&pct) {
                return Err(ClientError::Malformed {
                    operation: OP,
                    detail: format!("score {pct} out of range"),
                });
            }
        }
        Ok(score)
    }

    async fn register_webhook(
        &self,
        request: &WebhookRequest,
    ) -> Result<WebhookRegistration, ClientError> {
        const OP: &str = "register_webhook";
        let response = self
            .send(OP, self.http.post(self.url("/webhooks")).json(request))
            .await?;
        Self::json(OP, response).await
    }

    async fn latest_eula(&self) -> Result<EulaVersionInfo, ClientError> {
        const OP: &str = "latest_eula";
        let response = self.send(OP, self.http.get(self.url("/eula/latest"))).await?;
        Self::json(OP, response).await
    }

    async fn enabled_features(&self) -> Result<EnabledFeatures, ClientError> {
        const OP: &str = "enabled_features";
        let response = self
            .send(OP, self.http.get(self.url("/features-enabled")))
            .await?;
        let raw: serde_json::Value = Self::json(OP, response).await?;
        Ok(EnabledFeatures::from_value(raw))
    }
}
