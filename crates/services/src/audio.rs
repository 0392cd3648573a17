//! Single-play gate for listening narration.
//!
//! Each listening section may be narrated at most once. A playback that
//! completes, fails, is stopped, or is preempted by another section all count
//! as the one allowed play.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{PlaybackRefused, PlaybackUnavailable};

/// Narration language for generated transcripts.
pub const NARRATION_LANG: &str = "en-US";

/// Default synthesis pitch.
pub const DEFAULT_PITCH: f32 = 1.0;

//
// ─── SYNTHESIS SEAM ────────────────────────────────────────────────────────────
//

/// One narration request handed to the platform synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub section_id: u32,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub lang: &'static str,
}

/// Terminal result of a single playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Completion slot for one utterance.
///
/// The synthesizer resolves it exactly once. Dropping it unresolved counts
/// as a failure.
#[derive(Debug)]
pub struct PlaybackSlot(oneshot::Sender<PlaybackOutcome>);

impl PlaybackSlot {
    pub fn complete(self) {
        let _ = self.0.send(PlaybackOutcome::Completed);
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.0.send(PlaybackOutcome::Failed(reason.into()));
    }
}

/// Platform text-to-speech engine.
///
/// `speak` must return promptly and resolve the slot later; `cancel` stops
/// whatever is currently being spoken. Both run with the gate locked and must
/// not call back into it.
pub trait SpeechSynthesizer: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn speak(&self, utterance: Utterance, slot: PlaybackSlot);

    fn cancel(&self);
}

//
// ─── GATE ──────────────────────────────────────────────────────────────────────
//

/// Per-section playback flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub has_played: bool,
    pub is_playing: bool,
}

struct ActivePlayback {
    id: u64,
    section_id: u32,
    outcome: watch::Sender<Option<PlaybackOutcome>>,
}

#[derive(Default)]
struct GateState {
    sections: HashMap<u32, PlaybackState>,
    active: Option<ActivePlayback>,
    next_id: u64,
    closed: bool,
}

impl GateState {
    /// Settle the active playback if it is still `id`. Stale outcomes are
    /// ignored.
    fn finish(&mut self, id: u64, outcome: PlaybackOutcome) -> bool {
        if self.active.as_ref().is_none_or(|active| active.id != id) {
            return false;
        }
        self.settle_active(outcome).is_some()
    }

    fn settle_active(&mut self, outcome: PlaybackOutcome) -> Option<u32> {
        let active = self.active.take()?;
        let state = self.sections.entry(active.section_id).or_default();
        state.is_playing = false;
        state.has_played = true;
        active.outcome.send_replace(Some(outcome));
        Some(active.section_id)
    }
}

/// Awaitable view of one playback's outcome.
#[derive(Debug)]
pub struct PlaybackHandle {
    section_id: u32,
    outcome: watch::Receiver<Option<PlaybackOutcome>>,
}

impl PlaybackHandle {
    #[must_use]
    pub fn section_id(&self) -> u32 {
        self.section_id
    }

    /// Wait until the gate has recorded the playback's terminal outcome.
    pub async fn finished(mut self) -> PlaybackOutcome {
        loop {
            if let Some(outcome) = self.outcome.borrow_and_update().clone() {
                return outcome;
            }
            if self.outcome.changed().await.is_err() {
                return self
                    .outcome
                    .borrow()
                    .clone()
                    .unwrap_or(PlaybackOutcome::Cancelled);
            }
        }
    }
}

/// Enforces at-most-once narration per listening section, with at most one
/// section audible at a time.
pub struct AudioPlaybackGate {
    synth: Arc<dyn SpeechSynthesizer>,
    state: Arc<Mutex<GateState>>,
}

impl AudioPlaybackGate {
    #[must_use]
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synth,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self, section_id: u32) -> PlaybackState {
        self.lock()
            .sections
            .get(&section_id)
            .copied()
            .unwrap_or_default()
    }

    /// Section currently being narrated, if any.
    #[must_use]
    pub fn active_section(&self) -> Option<u32> {
        self.lock().active.as_ref().map(|active| active.section_id)
    }

    /// Start narrating `transcript` for `section_id`.
    ///
    /// Any other section still playing is cancelled first, which consumes
    /// its play.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackRefused` without changing any state when there is no
    /// transcript, synthesis is unsupported, the section already played or is
    /// playing, or the gate was shut down.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; completion is observed on
    /// a spawned task.
    pub fn play(
        &self,
        section_id: u32,
        transcript: Option<&str>,
        rate: f32,
        pitch: f32,
    ) -> Result<PlaybackHandle, PlaybackRefused> {
        let text = transcript
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(PlaybackUnavailable::NoTranscript)?;
        if !self.synth.is_available() {
            return Err(PlaybackUnavailable::Unsupported.into());
        }

        let (id, slot_rx, outcome_rx) = {
            let mut state = self.lock();
            if state.closed {
                return Err(PlaybackRefused::Closed);
            }
            let current = state.sections.get(&section_id).copied().unwrap_or_default();
            if current.is_playing {
                return Err(PlaybackRefused::InProgress(section_id));
            }
            if current.has_played {
                return Err(PlaybackRefused::AlreadyPlayed(section_id));
            }

            if let Some(previous) = state.settle_active(PlaybackOutcome::Cancelled) {
                debug!(previous, section_id, "preempting narration");
                self.synth.cancel();
            }

            state.next_id += 1;
            let id = state.next_id;
            let (slot_tx, slot_rx) = oneshot::channel();
            let (outcome_tx, outcome_rx) = watch::channel(None);
            state.sections.entry(section_id).or_default().is_playing = true;
            state.active = Some(ActivePlayback {
                id,
                section_id,
                outcome: outcome_tx,
            });

            info!(section_id, rate, "starting narration");
            self.synth.speak(
                Utterance {
                    section_id,
                    text: text.to_owned(),
                    rate,
                    pitch,
                    lang: NARRATION_LANG,
                },
                PlaybackSlot(slot_tx),
            );
            (id, slot_rx, outcome_rx)
        };

        let weak: Weak<Mutex<GateState>> = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            let outcome = slot_rx.await.unwrap_or_else(|_| {
                PlaybackOutcome::Failed("synthesizer dropped the utterance".into())
            });
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if let PlaybackOutcome::Failed(reason) = &outcome {
                warn!(section_id, %reason, "narration failed");
            }
            if state.finish(id, outcome) {
                debug!(section_id, "narration settled");
            }
        });

        Ok(PlaybackHandle {
            section_id,
            outcome: outcome_rx,
        })
    }

    /// Stop `section_id` if it is playing. Stopping still uses up the play.
    ///
    /// Returns whether anything was stopped.
    pub fn stop(&self, section_id: u32) -> bool {
        let mut state = self.lock();
        if state
            .active
            .as_ref()
            .is_none_or(|active| active.section_id != section_id)
        {
            return false;
        }
        state.settle_active(PlaybackOutcome::Cancelled);
        self.synth.cancel();
        info!(section_id, "narration stopped early");
        true
    }

    /// Cancel whatever is playing, whichever section it belongs to.
    pub fn stop_active(&self) -> Option<u32> {
        let mut state = self.lock();
        let stopped = state.settle_active(PlaybackOutcome::Cancelled);
        if stopped.is_some() {
            self.synth.cancel();
        }
        stopped
    }

    /// Release the synthesizer. Later outcomes are discarded and further
    /// `play` calls are refused.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.closed = true;
        if state.settle_active(PlaybackOutcome::Cancelled).is_some() {
            self.synth.cancel();
        }
    }
}

impl Drop for AudioPlaybackGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}
