mod controller;
mod machine;
mod progress;

pub use controller::{PhaseController, SubmitOutcome};
pub use machine::{InvalidTransition, PhaseEvent, PhaseState, PhaseStateMachine, transition};
pub use progress::PhaseProgress;
