use std::env;
use std::time::Duration;

use async_trait::async_trait;
use exam_core::model::{AnswerSnapshot, Level, PhaseNumber, PhaseOrdering, SessionId, SessionRecord};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiError, ExamApi};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ApiConfig {
    /// Read `EXAM_API_URL` and `EXAM_API_TIMEOUT_SECS`, falling back to the
    /// local development service and a 60 second timeout.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("EXAM_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let timeout = env::var("EXAM_API_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);
        Self { base_url, timeout }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// `ExamApi` over the service's JSON HTTP interface.
#[derive(Clone)]
pub struct HttpExamApi {
    client: Client,
    base_url: String,
}

impl HttpExamApi {
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/sessions{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<SessionRecord, ApiError> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "api request");

        let response = self.client.execute(request).await.inspect_err(|err| {
            warn!(%method, %url, error = %err, "no response from exam service");
        })?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let err = map_failure(status, &body);
        warn!(%method, %url, %status, error = %err, "exam service rejected request");
        Err(err)
    }
}

/// Turn a non-success response into an `ApiError`.
fn map_failure(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound;
    }
    ApiError::Status {
        status,
        detail: error_detail(body),
    }
}

/// Pull the `detail` field out of an error body, or return the raw text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(text),
        }) => text,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_owned(),
    }
}

fn generate_path(id: SessionId, phase: PhaseNumber) -> String {
    match phase {
        PhaseNumber::One => format!("/{id}/generate"),
        PhaseNumber::Two => format!("/{id}/generate-phase2"),
    }
}

fn submit_path(id: SessionId, phase: PhaseNumber) -> String {
    format!("/{id}/submit-phase{}", phase.as_u8())
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn create_session(&self, level: Level) -> Result<SessionRecord, ApiError> {
        let request = self
            .client
            .post(self.url(""))
            .json(&CreateSessionBody { level });
        self.send(request).await
    }

    async fn select_phase(
        &self,
        id: SessionId,
        ordering: PhaseOrdering,
    ) -> Result<SessionRecord, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/{id}/select-phase")))
            .json(&SelectPhaseBody { phase: ordering });
        self.send(request).await
    }

    async fn generate_phase(
        &self,
        id: SessionId,
        phase: PhaseNumber,
    ) -> Result<SessionRecord, ApiError> {
        let request = self.client.post(self.url(&generate_path(id, phase)));
        self.send(request).await
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let request = self.client.get(self.url(&format!("/{id}")));
        self.send(request).await
    }

    async fn submit_answers(
        &self,
        id: SessionId,
        phase: PhaseNumber,
        answers: &AnswerSnapshot,
    ) -> Result<SessionRecord, ApiError> {
        let request = self
            .client
            .post(self.url(&submit_path(id, phase)))
            .json(&AnswersBody { answers });
        self.send(request).await
    }

    async fn aggregate_results(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let request = self.client.post(self.url(&format!("/{id}/aggregate")));
        self.send(request).await
    }

    async fn generate_analysis(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/{id}/generate-analysis")));
        self.send(request).await
    }
}

#[derive(Debug, Serialize)]
struct CreateSessionBody {
    level: Level,
}

#[derive(Debug, Serialize)]
struct SelectPhaseBody {
    phase: PhaseOrdering,
}

#[derive(Debug, Serialize)]
struct AnswersBody<'a> {
    answers: &'a AnswerSnapshot,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_follow_service_layout() {
        let api = HttpExamApi::new(ApiConfig::default().with_base_url("http://exam.test/")).unwrap();
        let id = SessionId::new(5);
        assert_eq!(api.base_url(), "http://exam.test");
        assert_eq!(
            api.url(&generate_path(id, PhaseNumber::One)),
            "http://exam.test/api/sessions/5/generate"
        );
        assert_eq!(
            api.url(&generate_path(id, PhaseNumber::Two)),
            "http://exam.test/api/sessions/5/generate-phase2"
        );
        assert_eq!(
            api.url(&submit_path(id, PhaseNumber::Two)),
            "http://exam.test/api/sessions/5/submit-phase2"
        );
    }

    #[test]
    fn extracts_detail_from_error_bodies() {
        assert_eq!(
            error_detail(r#"{"detail":"Please complete phase 1 first"}"#),
            "Please complete phase 1 first"
        );
        assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"field required"}]}"#),
            r#"[{"msg":"field required"}]"#
        );
    }

    #[test]
    fn missing_sessions_map_to_not_found() {
        let err = map_failure(StatusCode::NOT_FOUND, r#"{"detail":"Session not found"}"#);
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn other_failures_keep_status_and_detail() {
        let err = map_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail":"Grading backend unavailable"}"#,
        );
        let ApiError::Status { status, detail } = err else {
            panic!("expected a status error");
        };
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail, "Grading backend unavailable");

        let err = map_failure(StatusCode::BAD_REQUEST, "");
        assert!(matches!(err, ApiError::Status { status, .. } if status == StatusCode::BAD_REQUEST));
    }

    #[test]
    fn answers_body_wraps_snapshot() {
        let snapshot = AnswerSnapshot::default();
        let json = serde_json::to_value(AnswersBody { answers: &snapshot }).unwrap();
        assert_eq!(json, serde_json::json!({ "answers": {} }));
    }
}
