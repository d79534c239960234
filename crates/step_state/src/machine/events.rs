//! Step events - Defines events that trigger step state transitions

use serde::{Deserialize, Serialize};

/// Events that can move a step through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEvent {
    // ========== Caller Events ==========
    /// The caller asked to submit the step's task.
    SubmitRequested,

    /// The caller cancelled the active task.
    Cancelled,

    /// The caller asked to retry a failed step.
    Retry,

    /// The caller recorded the succeeded task's result and moved on.
    ResultRecorded,

    // ========== Submission Events ==========
    /// The service accepted the submission.
    Submitted { task_id: String },

    /// The submission request failed.
    SubmissionFailed { error: String },

    // ========== Polling Events ==========
    /// The task reached `success`.
    TaskSucceeded,

    /// The task reached `failure`.
    TaskFailed { message: String },

    /// Polling gave up after repeated transport failures.
    PollingAborted { error: String },
}

impl StepEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitRequested => "submit_requested",
            Self::Cancelled => "cancelled",
            Self::Retry => "retry",
            Self::ResultRecorded => "result_recorded",
            Self::Submitted { .. } => "submitted",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::TaskSucceeded => "task_succeeded",
            Self::TaskFailed { .. } => "task_failed",
            Self::PollingAborted { .. } => "polling_aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(StepEvent::ResultRecorded.name(), "result_recorded");
        let event = StepEvent::TaskFailed {
            message: "quota exceeded".to_string(),
        };
        assert_eq!(event.name(), "task_failed");
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(StepEvent::Submitted {
            task_id: "t1".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"submitted": {"task_id": "t1"}}));
    }
}
