//! Step states - Defines all possible states of a workflow step

use serde::{Deserialize, Serialize};

/// Lifecycle of a single workflow step.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Ready to submit; no task is associated.
    #[default]
    Idle,

    /// A submission request is in flight.
    Submitting,

    /// The task was accepted and its status is being polled.
    Polling {
        /// Identifier assigned by the service.
        task_id: String,
    },

    /// The task reached `success`; its result waits to be recorded.
    Succeeded { task_id: String },

    /// The task's result was recorded and the workflow moved on.
    Completed {
        /// Identifier of the task that produced the result.
        task_id: String,
    },

    /// Submission, polling or the task itself failed.
    Failed {
        error_message: String,
        failed_at: String, // ISO timestamp
    },
}

impl StepState {
    /// A task for this step is being created or polled.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Polling { .. })
    }

    /// Check if this state allows a new submission.
    pub fn accepts_submission(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Task currently associated with the step, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Polling { task_id } | Self::Succeeded { task_id } | Self::Completed { task_id } => {
                Some(task_id)
            }
            _ => None,
        }
    }

    /// Short label for logs and UI badges.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling { .. } => "polling",
            Self::Succeeded { .. } => "succeeded",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
