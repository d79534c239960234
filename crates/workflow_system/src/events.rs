//! Workflow events - progressive updates for observers

use serde::Serialize;
use task_core::TaskSnapshot;

/// Emitted by the step controller as a workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The step's task was accepted by the service.
    StepSubmitted { step: String, task_id: String },

    /// A non-final or final status snapshot was observed.
    StepProgress { step: String, snapshot: TaskSnapshot },

    /// The step succeeded and its result was recorded.
    StepCompleted { step: String, task_id: String },

    /// The cursor moved to this step and its input is ready.
    StepReady { step: String },

    /// The step failed; the workflow is frozen here until retry.
    StepFailed { step: String, message: String },

    /// The step's active task was cancelled.
    StepCancelled { step: String },

    /// The last step succeeded.
    WorkflowCompleted { workflow: String },
}

impl WorkflowEvent {
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepSubmitted { step, .. }
            | Self::StepProgress { step, .. }
            | Self::StepCompleted { step, .. }
            | Self::StepReady { step }
            | Self::StepFailed { step, .. }
            | Self::StepCancelled { step } => Some(step),
            Self::WorkflowCompleted { .. } => None,
        }
    }
}
