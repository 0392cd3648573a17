use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use tracing::{debug, info, warn};

use exam_core::model::{
    AnswerKey, AnswerSnapshot, FinalResults, Level, PhaseNumber, SessionId, SessionRecord, Skill,
    WritingTask,
};
use exam_core::{Clock, PhaseTimer, WordCountStatus};
use remote::{ApiError, ExamApi};

use crate::answers::AnswerStore;
use crate::audio::{AudioPlaybackGate, DEFAULT_PITCH, PlaybackHandle, PlaybackState, SpeechSynthesizer};
use crate::error::PhaseError;
use crate::loader::PhaseContentLoader;

use super::machine::{InvalidTransition, PhaseEvent, PhaseState, PhaseStateMachine};
use super::progress::PhaseProgress;

/// Result of a `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A submission or aggregation was already in flight.
    Ignored,
    /// Phase answers were accepted and the next phase is loaded.
    Advanced(PhaseNumber),
    /// Both phases are in and final results are available.
    Completed(FinalResults),
}

struct Inner {
    machine: PhaseStateMachine,
    answers: AnswerStore,
    session: Option<SessionRecord>,
    timer: Option<PhaseTimer>,
    seen_epoch: u64,
}

impl Inner {
    /// Apply `event` and drop per-phase data when a new epoch starts.
    fn apply(&mut self, event: PhaseEvent) -> Result<(), InvalidTransition> {
        self.machine.apply(event)?;
        if self.machine.epoch() != self.seen_epoch {
            self.seen_epoch = self.machine.epoch();
            self.answers.clear();
            self.session = None;
            self.timer = None;
        }
        Ok(())
    }
}

enum Step {
    Submit(PhaseNumber, AnswerSnapshot),
    Aggregate,
}

/// Drives one test session through its two phases.
///
/// Cloning yields another handle to the same session. All state sits behind
/// one lock that is never held across a remote call, so a second `submit`
/// racing the first sees the busy state and backs off.
#[derive(Clone)]
pub struct PhaseController {
    session_id: SessionId,
    api: Arc<dyn ExamApi>,
    loader: PhaseContentLoader,
    clock: Clock,
    inner: Arc<Mutex<Inner>>,
    audio: Arc<AudioPlaybackGate>,
}

impl PhaseController {
    #[must_use]
    pub fn new(
        api: Arc<dyn ExamApi>,
        session_id: SessionId,
        synth: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            session_id,
            loader: PhaseContentLoader::new(Arc::clone(&api)),
            api,
            clock: Clock::default(),
            inner: Arc::new(Mutex::new(Inner {
                machine: PhaseStateMachine::new(),
                answers: AnswerStore::new(),
                session: None,
                timer: None,
                seen_epoch: 0,
            })),
            audio: Arc::new(AudioPlaybackGate::new(synth)),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    // ─── PHASE LIFECYCLE ───────────────────────────────────────────────────

    /// Show phase 1.
    ///
    /// # Errors
    ///
    /// See [`PhaseController::enter_phase`].
    pub async fn start(&self) -> Result<(), PhaseError> {
        self.enter_phase(PhaseNumber::One).await
    }

    /// Switch to `phase` and load its content.
    ///
    /// Answers, the cached session and the phase timer are discarded and any
    /// narration is stopped. Calling this again after a failed load retries.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::InvalidTransition` while a submission is in
    /// flight, once the phase's answers were accepted, for a phase earlier
    /// than the current one, or after results are in, and
    /// `PhaseError::ContentUnavailable`
    /// when content cannot be fetched or generated.
    pub async fn enter_phase(&self, phase: PhaseNumber) -> Result<(), PhaseError> {
        let epoch = {
            let mut inner = self.lock();
            inner.apply(PhaseEvent::PhaseEntered(phase))?;
            inner.machine.epoch()
        };
        info!(session = %self.session_id, %phase, epoch, "entering phase");
        self.audio.stop_active();
        self.load_into(epoch, phase).await
    }

    async fn load_into(&self, epoch: u64, phase: PhaseNumber) -> Result<(), PhaseError> {
        let loaded = self.loader.load(self.session_id, phase).await;

        let mut inner = self.lock();
        if inner.machine.epoch() != epoch {
            debug!(%phase, epoch, "discarding stale phase load");
            return Ok(());
        }
        match loaded {
            Ok(loaded) => {
                inner.apply(PhaseEvent::ContentLoaded {
                    phase,
                    content: loaded.content,
                })?;
                inner.session = Some(loaded.session);
                inner.timer = Some(PhaseTimer::start(self.clock.now()));
                Ok(())
            }
            Err(err) => {
                warn!(%phase, error = %err, "phase content unavailable");
                let reason = err.to_string();
                inner.apply(PhaseEvent::ContentFailed {
                    phase,
                    reason: reason.clone(),
                })?;
                Err(PhaseError::ContentUnavailable { phase, reason })
            }
        }
    }

    /// Submit the current phase.
    ///
    /// Phase 1 answers advance to phase 2. Phase 2 answers are followed by
    /// aggregation. When aggregation failed earlier, only aggregation is
    /// retried and the answers are not sent again.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::SubmissionFailed` or
    /// `PhaseError::AggregationFailed` when the remote call fails (the phase
    /// is back in `Ready` and can be resubmitted), and `PhaseError::NotReady`
    /// when no content is loaded.
    pub async fn submit(&self) -> Result<SubmitOutcome, PhaseError> {
        let step = {
            let mut inner = self.lock();
            match inner.machine.state().clone() {
                state if state.is_busy() => {
                    debug!(state = state.name(), "submit ignored while busy");
                    return Ok(SubmitOutcome::Ignored);
                }
                PhaseState::Ready {
                    answers_submitted: true,
                    ..
                } => {
                    inner.apply(PhaseEvent::AggregateStarted)?;
                    Step::Aggregate
                }
                PhaseState::Ready { phase, .. } => {
                    let snapshot = inner.answers.snapshot();
                    inner.apply(PhaseEvent::SubmitStarted)?;
                    Step::Submit(phase, snapshot)
                }
                other => return Err(PhaseError::NotReady(other.name())),
            }
        };

        match step {
            Step::Aggregate => self.aggregate().await,
            Step::Submit(phase, snapshot) => self.send_answers(phase, snapshot).await,
        }
    }

    async fn send_answers(
        &self,
        phase: PhaseNumber,
        snapshot: AnswerSnapshot,
    ) -> Result<SubmitOutcome, PhaseError> {
        info!(session = %self.session_id, %phase, answers = snapshot.len(), "submitting answers");
        let result = self
            .api
            .submit_answers(self.session_id, phase, &snapshot)
            .await;

        let next_epoch = {
            let mut inner = self.lock();
            match result {
                Err(source) => {
                    warn!(%phase, error = %source, "submission failed");
                    inner.apply(PhaseEvent::SubmitFailed)?;
                    return Err(PhaseError::SubmissionFailed { phase, source });
                }
                Ok(session) => {
                    inner.apply(PhaseEvent::SubmitSucceeded)?;
                    match phase.next() {
                        Some(next) => Some((next, inner.machine.epoch())),
                        None => {
                            inner.session = Some(session);
                            None
                        }
                    }
                }
            }
        };

        match next_epoch {
            Some((next, epoch)) => {
                self.audio.stop_active();
                self.load_into(epoch, next).await?;
                Ok(SubmitOutcome::Advanced(next))
            }
            None => self.aggregate().await,
        }
    }

    async fn aggregate(&self) -> Result<SubmitOutcome, PhaseError> {
        info!(session = %self.session_id, "aggregating final results");
        let result = self.api.aggregate_results(self.session_id).await.and_then(|session| {
            let results = session.final_results.clone().ok_or_else(|| {
                ApiError::Decode("aggregation returned no final results".into())
            })?;
            Ok((session, results))
        });

        let mut inner = self.lock();
        match result {
            Ok((session, results)) => {
                inner.apply(PhaseEvent::AggregateSucceeded(results.clone()))?;
                inner.session = Some(session);
                info!(overall = results.overall, "final results ready");
                Ok(SubmitOutcome::Completed(results))
            }
            Err(source) => {
                warn!(error = %source, "aggregation failed");
                inner.apply(PhaseEvent::AggregateFailed)?;
                Err(PhaseError::AggregationFailed(source))
            }
        }
    }

    /// Ask the service for the detailed analysis and attach it to the
    /// results on screen.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::NotReady` before results exist and
    /// `PhaseError::AnalysisFailed` when the remote call fails.
    pub async fn request_analysis(&self) -> Result<FinalResults, PhaseError> {
        {
            let inner = self.lock();
            let state = inner.machine.state();
            if !matches!(state, PhaseState::Done { .. }) {
                return Err(PhaseError::NotReady(state.name()));
            }
        }

        let session = self
            .api
            .generate_analysis(self.session_id)
            .await
            .map_err(PhaseError::AnalysisFailed)?;
        let results = session.final_results.clone().ok_or_else(|| {
            PhaseError::AnalysisFailed(ApiError::Decode("session has no final results".into()))
        })?;

        let mut inner = self.lock();
        inner.apply(PhaseEvent::AnalysisAttached(results.clone()))?;
        inner.session = Some(session);
        Ok(results)
    }

    // ─── INPUT ─────────────────────────────────────────────────────────────

    /// Record raw input for `key`, decoded by the question's shape.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::InputLocked` outside `Ready` or once the answers
    /// were accepted, `PhaseError::UnknownQuestion` when the loaded content
    /// has no such slot, and `PhaseError::Answer` for malformed input.
    pub fn record_answer(&self, key: AnswerKey, raw: &str) -> Result<(), PhaseError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let kind = match inner.machine.state() {
            PhaseState::Ready {
                content,
                answers_submitted: false,
                ..
            } => content.kind_of(&key),
            PhaseState::Ready { .. } => return Err(PhaseError::InputLocked("results are pending")),
            other => return Err(PhaseError::InputLocked(other.name())),
        };
        let kind = kind.ok_or_else(|| PhaseError::UnknownQuestion(key.clone()))?;
        inner.answers.record(key, kind, raw)?;
        Ok(())
    }

    // ─── QUERIES ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> PhaseState {
        self.lock().machine.state().clone()
    }

    #[must_use]
    pub fn phase(&self) -> PhaseNumber {
        self.lock().machine.state().phase()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.lock().machine.epoch()
    }

    /// Copy of the answers recorded in the current phase.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSnapshot {
        self.lock().answers.snapshot()
    }

    #[must_use]
    pub fn progress(&self) -> Option<PhaseProgress> {
        let inner = self.lock();
        let content = inner.machine.state().content()?;
        Some(PhaseProgress::measure(content, &inner.answers))
    }

    /// Skills presented in the current phase, per the chosen ordering.
    #[must_use]
    pub fn visible_skills(&self) -> Option<[Skill; 2]> {
        let inner = self.lock();
        let phase = inner.machine.state().phase();
        inner.session.as_ref()?.skills_for(phase)
    }

    /// Word-count status of the current draft for `task`, or `None` when the
    /// phase has no such task.
    #[must_use]
    pub fn writing_status(&self, task: WritingTask) -> Option<WordCountStatus> {
        let inner = self.lock();
        let writing = inner.machine.state().content()?.writing.as_ref()?;
        if !writing.has_task(task) {
            return None;
        }
        let draft = inner
            .answers
            .get(&AnswerKey::Writing(task))
            .map_or("", |value| value.as_str());
        Some(writing.range_for(task).classify(draft))
    }

    /// Time left on the phase clock, clamped at zero.
    #[must_use]
    pub fn time_remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.lock().timer.map(|timer| timer.remaining(now))
    }

    #[must_use]
    pub fn results(&self) -> Option<FinalResults> {
        match self.lock().machine.state() {
            PhaseState::Done { results } => Some(results.clone()),
            _ => None,
        }
    }

    /// Latest session record, fetched when the current phase has no copy.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::Api` when the fetch fails.
    pub async fn session_record(&self) -> Result<SessionRecord, PhaseError> {
        let epoch = {
            let inner = self.lock();
            if let Some(session) = &inner.session {
                return Ok(session.clone());
            }
            inner.machine.epoch()
        };

        let session = self.api.get_session(self.session_id).await?;
        let mut inner = self.lock();
        if inner.machine.epoch() == epoch && inner.session.is_none() {
            inner.session = Some(session.clone());
        }
        Ok(session)
    }

    // ─── LISTENING AUDIO ───────────────────────────────────────────────────

    /// Narrate a listening section once, at the session level's rate.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::NotReady` outside `Ready`,
    /// `PhaseError::UnknownSection` for a section the phase lacks, and
    /// `PhaseError::Playback` when the gate refuses.
    pub fn play_listening(&self, section_id: u32) -> Result<PlaybackHandle, PhaseError> {
        let (transcript, rate) = {
            let inner = self.lock();
            let state = inner.machine.state();
            let PhaseState::Ready { content, .. } = state else {
                return Err(PhaseError::NotReady(state.name()));
            };
            let section = content
                .listening_section(section_id)
                .ok_or(PhaseError::UnknownSection(section_id))?;
            let level = inner
                .session
                .as_ref()
                .map_or(Level::Intermediate, |session| session.level);
            (
                section.transcript().map(str::to_owned),
                level.playback_rate(),
            )
        };

        let handle = self
            .audio
            .play(section_id, transcript.as_deref(), rate, DEFAULT_PITCH)?;
        Ok(handle)
    }

    pub fn stop_listening(&self, section_id: u32) -> bool {
        self.audio.stop(section_id)
    }

    #[must_use]
    pub fn playback_state(&self, section_id: u32) -> PlaybackState {
        self.audio.state(section_id)
    }

    /// Stop narration and release the synthesizer.
    pub fn teardown(&self) {
        self.audio.shutdown();
    }
}
