//! Workflow System
//!
//! Multi-step workflows over long-running server tasks: submit a step,
//! poll it to a terminal status, project its result into the next step.

pub mod controller;
pub mod events;
pub mod flows;
pub mod poller;
pub mod projector;
pub mod submitter;
pub mod types;

pub use controller::{Advance, StepResult, StepRun, WorkflowStepController};
pub use events::WorkflowEvent;
pub use poller::TaskPoller;
pub use projector::ResultProjector;
pub use submitter::TaskSubmitter;
pub use types::{
    decode_tagged, StepDefinition, StepInput, StepOutput, WorkflowBuilder, WorkflowDefinition,
    WorkflowError,
};
