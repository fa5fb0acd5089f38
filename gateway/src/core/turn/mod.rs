//! Turn orchestration: the per-call state machine and the controller that drives it.

mod controller;
mod intent;
mod state;

pub use controller::{TurnController, TurnOutcome, TurnReplies};
pub use intent::EndOfCallDetector;
pub use state::{InvalidTransition, TurnEvent, TurnState};
