//! In-process fakes for exercising the engine without the remote service.

use crate::client::{
    ClientError, CreateSubmissionRequest, CreatedSubmission, EnabledFeatures, EulaVersionInfo,
    RemoteSubmissionStatus, ReportRequest, ScoreStatus, SimilarityClient, SimilarityScore,
    SubmissionInfo, WebhookRegistration, WebhookRequest,
};
use crate::notifier::{Notifier, NotifyError, Recipient, Template};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type Queue<T> = Mutex<VecDeque<Result<T, ClientError>>>;

/// A [`SimilarityClient`] that replays queued results per operation and
/// falls back to a successful answer when a queue is empty.
#[derive(Default)]
pub struct ScriptedClient {
    create: Queue<CreatedSubmission>,
    upload: Queue<()>,
    info: Queue<SubmissionInfo>,
    report: Queue<()>,
    score: Queue<SimilarityScore>,
    webhook: Queue<WebhookRegistration>,
    eula: Queue<EulaVersionInfo>,
    features: Queue<EnabledFeatures>,
    calls: Mutex<Vec<&'static str>>,
    created: Mutex<Vec<CreateSubmissionRequest>>,
    next_id: AtomicU64,
    delay: Mutex<Option<Duration>>,
}

fn pop<T>(queue: &Queue<T>) -> Option<Result<T, ClientError>> {
    queue.lock().ok().and_then(|mut q| q.pop_front())
}

fn push<T>(queue: &Queue<T>, result: Result<T, ClientError>) {
    if let Ok(mut q) = queue.lock() {
        q.push_back(result);
    }
}

pub fn transient(operation: &'static str) -> ClientError {
    ClientError::Transient {
        operation,
        detail: "scripted failure".into(),
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, result: Result<CreatedSubmission, ClientError>) {
        push(&self.create, result);
    }

    pub fn push_upload(&self, result: Result<(), ClientError>) {
        push(&self.upload, result);
    }

    pub fn push_info(&self, result: Result<SubmissionInfo, ClientError>) {
        push(&self.info, result);
    }

    pub fn push_report(&self, result: Result<(), ClientError>) {
        push(&self.report, result);
    }

    pub fn push_score(&self, result: Result<SimilarityScore, ClientError>) {
        push(&self.score, result);
    }

    pub fn push_webhook(&self, result: Result<WebhookRegistration, ClientError>) {
        push(&self.webhook, result);
    }

    pub fn push_eula(&self, result: Result<EulaVersionInfo, ClientError>) {
        push(&self.eula, result);
    }

    pub fn push_features(&self, result: Result<EnabledFeatures, ClientError>) {
        push(&self.features, result);
    }

    /// Makes every call sleep first, to exercise timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.delay.lock() {
            *d = delay;
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| **c == operation).count()
    }

    pub fn created_requests(&self) -> Vec<CreateSubmissionRequest> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    async fn enter(&self, operation: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation);
        }
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SimilarityClient for ScriptedClient {
    async fn create_submission(
        &self,
        request: &CreateSubmissionRequest,
    ) -> Result<CreatedSubmission, ClientError> {
        self.enter("create_submission").await;
        if let Ok(mut created) = self.created.lock() {
            created.push(request.clone());
        }
        pop(&self.create).unwrap_or_else(|| {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CreatedSubmission {
                id: format!("ext-{n}"),
            })
        })
    }

    async fn upload_original(
        &self,
        _external_id: &str,
        _filename: &str,
        _content: Vec<u8>,
    ) -> Result<(), ClientError> {
        self.enter("upload_original").await;
        pop(&self.upload).unwrap_or(Ok(()))
    }

    async fn get_submission_info(&self, _external_id: &str) -> Result<SubmissionInfo, ClientError> {
        self.enter("get_submission_info").await;
        pop(&self.info).unwrap_or(Ok(SubmissionInfo {
            status: RemoteSubmissionStatus::Complete,
            error_code: None,
        }))
    }

    async fn request_report(
        &self,
        _external_id: &str,
        _request: &ReportRequest,
    ) -> Result<(), ClientError> {
        self.enter("request_report").await;
        pop(&self.report).unwrap_or(Ok(()))
    }

    async fn get_score(&self, _external_id: &str) -> Result<SimilarityScore, ClientError> {
        self.enter("get_score").await;
        pop(&self.score).unwrap_or(Ok(SimilarityScore {
            status: ScoreStatus::Complete,
            overall_match_percentage: Some(42),
        }))
    }

    async fn register_webhook(
        &self,
        _request: &WebhookRequest,
    ) -> Result<WebhookRegistration, ClientError> {
        self.enter("register_webhook").await;
        pop(&self.webhook).unwrap_or(Ok(WebhookRegistration { id: "wh-1".into() }))
    }

    async fn latest_eula(&self) -> Result<EulaVersionInfo, ClientError> {
        self.enter("latest_eula").await;
        pop(&self.eula).unwrap_or(Ok(EulaVersionInfo {
            version: "v1".into(),
            url: Some("https://example.invalid/eula/v1".into()),
        }))
    }

    async fn enabled_features(&self) -> Result<EnabledFeatures, ClientError> {
        self.enter("enabled_features").await;
        pop(&self.features)
            .unwrap_or_else(|| Ok(EnabledFeatures::from_value(json!({"tenant": {"require_eula": true}}))))
    }
}

/// Keeps every notification it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Recipient, Template, Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Recipient, Template, Value)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self, template: Template) -> usize {
        self.sent().iter().filter(|(_, t, _)| *t == template).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        template: Template,
        data: &Value,
    ) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.clone(), template, data.clone()));
        }
        Ok(())
    }
}
