//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{AnswerError, AnswerKey, PhaseNumber};
use remote::ApiError;

use crate::phase::InvalidTransition;

/// Errors emitted by `PhaseContentLoader`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("phase {0} content is still missing after generation")]
    ContentUnavailable(PhaseNumber),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Reasons the narration for a section cannot start at all.
///
/// These never consume the section's single play.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaybackUnavailable {
    #[error("no audio transcript is available for this section")]
    NoTranscript,
    #[error("speech synthesis is not supported on this platform")]
    Unsupported,
}

/// Notice returned when a `play` request is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaybackRefused {
    #[error(transparent)]
    Unavailable(#[from] PlaybackUnavailable),
    #[error("section {0} has already been played")]
    AlreadyPlayed(u32),
    #[error("section {0} is already playing")]
    InProgress(u32),
    #[error("audio playback has been shut down")]
    Closed,
}

/// Errors emitted by `PhaseController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PhaseError {
    #[error("phase {phase} content is unavailable: {reason}")]
    ContentUnavailable { phase: PhaseNumber, reason: String },
    #[error("submitting phase {phase} answers failed")]
    SubmissionFailed {
        phase: PhaseNumber,
        #[source]
        source: ApiError,
    },
    #[error("aggregating final results failed")]
    AggregationFailed(#[source] ApiError),
    #[error("generating the detailed analysis failed")]
    AnalysisFailed(#[source] ApiError),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("cannot do that while {0}")]
    NotReady(&'static str),
    #[error("answers are locked while {0}")]
    InputLocked(&'static str),
    #[error("{0} is not a question in the current phase")]
    UnknownQuestion(AnswerKey),
    #[error("no listening section {0} in the current phase")]
    UnknownSection(u32),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Playback(#[from] PlaybackRefused),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PhaseError {
    /// Message suitable for showing to the test-taker.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PhaseError::SubmissionFailed { source, .. }
            | PhaseError::AggregationFailed(source)
            | PhaseError::AnalysisFailed(source)
            | PhaseError::Api(source) => source.user_message(),
            other => other.to_string(),
        }
    }
}
