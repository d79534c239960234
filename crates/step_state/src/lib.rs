//! step_state - State machine for workflow steps
//!
//! Each step of a workflow moves through
//! `idle → submitting → polling → succeeded → completed`, or into `failed`
//! from any of the middle states. A failed step stays failed until it is
//! explicitly retried.

pub mod machine;

// Re-export commonly used types
pub use machine::{StateMachine, StateTransition, StepEvent, StepState, TransitionError};
