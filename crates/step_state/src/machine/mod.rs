//! State machine module
//!
//! Contains the FSM implementation for the step lifecycle.

mod events;
mod states;
mod transitions;

pub use events::StepEvent;
pub use states::StepState;
pub use transitions::{StateMachine, StateTransition, TransitionError};
