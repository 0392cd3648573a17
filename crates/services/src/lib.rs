#![forbid(unsafe_code)]

pub mod answers;
pub mod audio;
pub mod error;
pub mod loader;
pub mod phase;
pub mod setup;

pub use exam_core::Clock;

pub use answers::AnswerStore;
pub use audio::{
    AudioPlaybackGate, PlaybackHandle, PlaybackOutcome, PlaybackSlot, PlaybackState,
    SpeechSynthesizer, Utterance,
};
pub use error::{LoadError, PhaseError, PlaybackRefused, PlaybackUnavailable};
pub use loader::{LoadedPhase, PhaseContentLoader};
pub use phase::{
    InvalidTransition, PhaseController, PhaseEvent, PhaseProgress, PhaseState, PhaseStateMachine,
    SubmitOutcome,
};
pub use setup::start_session;
