use async_trait::async_trait;
use exam_core::model::{AnswerSnapshot, Level, PhaseNumber, PhaseOrdering, SessionId, SessionRecord};
use thiserror::Error;

/// Errors surfaced by remote service adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("session not found")]
    NotFound,

    #[error("request failed with status {status}: {detail}")]
    Status {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl ApiError {
    /// Message suitable for showing to the test-taker.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { detail, .. } if !detail.is_empty() => detail.clone(),
            ApiError::NotFound => "Session not found. Please create a new session.".into(),
            _ => "Something went wrong. Please try again.".into(),
        }
    }
}

/// Operation names, used for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    CreateSession,
    SelectPhase,
    Generate(PhaseNumber),
    GetSession,
    Submit(PhaseNumber),
    Aggregate,
    GenerateAnalysis,
}

/// Contract of the remote content-generation and grading service.
///
/// Every operation returns the full, updated session record.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError::Status` if the level is rejected.
    async fn create_session(&self, level: Level) -> Result<SessionRecord, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown session, or
    /// `ApiError::Status` if an ordering was already chosen.
    async fn select_phase(
        &self,
        id: SessionId,
        ordering: PhaseOrdering,
    ) -> Result<SessionRecord, ApiError>;

    /// Generate content for `phase`. The service returns existing content
    /// unchanged if it was already generated.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if generation fails.
    async fn generate_phase(
        &self,
        id: SessionId,
        phase: PhaseNumber,
    ) -> Result<SessionRecord, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown session.
    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, ApiError>;

    /// Submit the complete answer snapshot for `phase` for grading.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on validation or grading failure.
    async fn submit_answers(
        &self,
        id: SessionId,
        phase: PhaseNumber,
        answers: &AnswerSnapshot,
    ) -> Result<SessionRecord, ApiError>;

    /// Combine both phases' scores into final results.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if aggregation fails.
    async fn aggregate_results(&self, id: SessionId) -> Result<SessionRecord, ApiError>;

    /// Attach the detailed per-skill analysis to already aggregated results.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if results have not been aggregated yet.
    async fn generate_analysis(&self, id: SessionId) -> Result<SessionRecord, ApiError>;
}
