use std::sync::Arc;

use thiserror::Error;

use exam_core::model::{FinalResults, PhaseContent, PhaseNumber};

/// Where the active phase stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseState {
    /// Content for `phase` is being fetched or generated.
    Loading { phase: PhaseNumber },
    /// Content is shown and accepting input.
    Ready {
        phase: PhaseNumber,
        content: Arc<PhaseContent>,
        /// Set when the answers were accepted but aggregation failed; the
        /// next submit only retries aggregation.
        answers_submitted: bool,
    },
    /// Answers are in flight.
    Submitting {
        phase: PhaseNumber,
        content: Arc<PhaseContent>,
    },
    /// Both phases are in; final results are being computed.
    Aggregating { content: Arc<PhaseContent> },
    /// Final results are available.
    Done { results: FinalResults },
    /// Content could not be obtained. Entering the phase again retries.
    Unavailable { phase: PhaseNumber, reason: String },
}

impl PhaseState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PhaseState::Loading { .. } => "loading",
            PhaseState::Ready { .. } => "ready",
            PhaseState::Submitting { .. } => "submitting",
            PhaseState::Aggregating { .. } => "aggregating",
            PhaseState::Done { .. } => "done",
            PhaseState::Unavailable { .. } => "unavailable",
        }
    }

    /// Phase the state belongs to. Aggregation and results follow phase 2.
    #[must_use]
    pub fn phase(&self) -> PhaseNumber {
        match self {
            PhaseState::Loading { phase }
            | PhaseState::Ready { phase, .. }
            | PhaseState::Submitting { phase, .. }
            | PhaseState::Unavailable { phase, .. } => *phase,
            PhaseState::Aggregating { .. } | PhaseState::Done { .. } => PhaseNumber::Two,
        }
    }

    /// Content currently on screen, if any.
    #[must_use]
    pub fn content(&self) -> Option<&Arc<PhaseContent>> {
        match self {
            PhaseState::Ready { content, .. }
            | PhaseState::Submitting { content, .. }
            | PhaseState::Aggregating { content } => Some(content),
            _ => None,
        }
    }

    /// True while a remote call owns the state.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PhaseState::Submitting { .. } | PhaseState::Aggregating { .. }
        )
    }
}

/// Inputs to the phase state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    PhaseEntered(PhaseNumber),
    ContentLoaded {
        phase: PhaseNumber,
        content: Arc<PhaseContent>,
    },
    ContentFailed {
        phase: PhaseNumber,
        reason: String,
    },
    SubmitStarted,
    SubmitSucceeded,
    SubmitFailed,
    AggregateStarted,
    AggregateSucceeded(FinalResults),
    AggregateFailed,
    AnalysisAttached(FinalResults),
}

impl PhaseEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PhaseEvent::PhaseEntered(_) => "phase_entered",
            PhaseEvent::ContentLoaded { .. } => "content_loaded",
            PhaseEvent::ContentFailed { .. } => "content_failed",
            PhaseEvent::SubmitStarted => "submit_started",
            PhaseEvent::SubmitSucceeded => "submit_succeeded",
            PhaseEvent::SubmitFailed => "submit_failed",
            PhaseEvent::AggregateStarted => "aggregate_started",
            PhaseEvent::AggregateSucceeded(_) => "aggregate_succeeded",
            PhaseEvent::AggregateFailed => "aggregate_failed",
            PhaseEvent::AnalysisAttached(_) => "analysis_attached",
        }
    }
}

/// Error returned when an event does not apply to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event} cannot be applied while {from}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

/// Compute the state that follows `state` on `event`.
///
/// # Errors
///
/// Returns `InvalidTransition` when `event` is not accepted in `state`.
pub fn transition(state: &PhaseState, event: PhaseEvent) -> Result<PhaseState, InvalidTransition> {
    use PhaseEvent as E;
    use PhaseState as S;

    let next = match (state, event) {
        // Phases never go backwards, and accepted answers are never reopened.
        (
            S::Loading { phase: current }
            | S::Ready {
                phase: current,
                answers_submitted: false,
                ..
            }
            | S::Unavailable { phase: current, .. },
            E::PhaseEntered(phase),
        ) if phase >= *current => S::Loading { phase },
        (S::Loading { phase }, E::ContentLoaded { phase: loaded, content }) if *phase == loaded => {
            S::Ready {
                phase: loaded,
                content,
                answers_submitted: false,
            }
        }
        (S::Loading { phase }, E::ContentFailed { phase: failed, reason }) if *phase == failed => {
            S::Unavailable {
                phase: failed,
                reason,
            }
        }
        (
            S::Ready {
                phase,
                content,
                answers_submitted: false,
            },
            E::SubmitStarted,
        ) => S::Submitting {
            phase: *phase,
            content: Arc::clone(content),
        },
        (
            S::Ready {
                phase: PhaseNumber::Two,
                content,
                answers_submitted: true,
            },
            E::AggregateStarted,
        ) => S::Aggregating {
            content: Arc::clone(content),
        },
        (S::Submitting { phase, content }, E::SubmitSucceeded) => match phase.next() {
            Some(next) => S::Loading { phase: next },
            None => S::Aggregating {
                content: Arc::clone(content),
            },
        },
        (S::Submitting { phase, content }, E::SubmitFailed) => S::Ready {
            phase: *phase,
            content: Arc::clone(content),
            answers_submitted: false,
        },
        (S::Aggregating { .. }, E::AggregateSucceeded(results)) => S::Done { results },
        (S::Aggregating { content }, E::AggregateFailed) => S::Ready {
            phase: PhaseNumber::Two,
            content: Arc::clone(content),
            answers_submitted: true,
        },
        (S::Done { .. }, E::AnalysisAttached(results)) => S::Done { results },
        (from, event) => {
            return Err(InvalidTransition {
                from: from.name(),
                event: event.name(),
            });
        }
    };

    Ok(next)
}

/// Phase state plus the epoch counter.
///
/// The epoch advances every time a `Loading` state is entered, so results
/// of loads started under an older epoch can be recognised and dropped.
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    state: PhaseState,
    epoch: u64,
}

impl Default for PhaseStateMachine {
    fn default() -> Self {
        Self {
            state: PhaseState::Loading {
                phase: PhaseNumber::One,
            },
            epoch: 0,
        }
    }
}

impl PhaseStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Apply `event`, leaving the state untouched on error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when `event` is not accepted in the
    /// current state.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<&PhaseState, InvalidTransition> {
        let next = transition(&self.state, event)?;
        if matches!(next, PhaseState::Loading { .. }) {
            self.epoch += 1;
        }
        self.state = next;
        Ok(&self.state)
    }
}
