//! State transitions - FSM transition logic
//!
//! Implements the state machine that handles event-driven step transitions.

use thiserror::Error;

use super::events::StepEvent;
use super::states::StepState;

/// Error type for invalid state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} with event {event}")]
    InvalidTransition { from: StepState, event: String },
}

/// Represents a state transition result.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: StepState,
    /// The state after the transition.
    pub to: StepState,
    /// The event that triggered the transition.
    pub event: StepEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for a single workflow step.
#[derive(Debug, Clone)]
pub struct StateMachine {
    /// Current state.
    current_state: StepState,
    /// Transition history (limited).
    history: Vec<StateTransition>,
    /// Max history entries to keep.
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self {
            current_state: StepState::Idle,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> &StepState {
        &self.current_state
    }

    /// Get the transition history.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event and transition to a new state.
    ///
    /// Events with no transition from the current state leave it unchanged.
    pub fn handle_event(&mut self, event: StepEvent) -> StateTransition {
        let old_state = self.current_state.clone();
        let new_state = self.compute_next_state(&old_state, &event);
        let changed = old_state != new_state;

        if changed {
            log::debug!(
                "step {} -> {} on {}",
                old_state.label(),
                new_state.label(),
                event.name()
            );
        }
        self.current_state = new_state.clone();

        let transition = StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        };

        // Add to history
        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        transition
    }

    /// Like `handle_event`, but rejects events that would not move the machine.
    pub fn try_handle_event(&mut self, event: StepEvent) -> Result<StateTransition, TransitionError> {
        if !self.can_transition(&event) {
            return Err(TransitionError::InvalidTransition {
                from: self.current_state.clone(),
                event: event.name().to_string(),
            });
        }
        Ok(self.handle_event(event))
    }

    /// Compute the next state given current state and event.
    fn compute_next_state(&self, state: &StepState, event: &StepEvent) -> StepState {
        use StepEvent::*;
        use StepState::*;

        match (state, event) {
            // ========== Submission ==========
            (Idle, SubmitRequested) => Submitting,
            (Submitting, Submitted { task_id }) => Polling {
                task_id: task_id.clone(),
            },
            (Submitting, SubmissionFailed { error }) => Failed {
                error_message: error.clone(),
                failed_at: chrono::Utc::now().to_rfc3339(),
            },

            // ========== Polling ==========
            (Polling { task_id }, TaskSucceeded) => Succeeded {
                task_id: task_id.clone(),
            },
            // A succeeded task whose result cannot be used fails the step too.
            (Polling { .. } | Succeeded { .. }, TaskFailed { message }) => Failed {
                error_message: message.clone(),
                failed_at: chrono::Utc::now().to_rfc3339(),
            },
            (Polling { .. }, PollingAborted { error }) => Failed {
                error_message: error.clone(),
                failed_at: chrono::Utc::now().to_rfc3339(),
            },

            // ========== Caller Actions ==========
            (Succeeded { task_id }, ResultRecorded) => Completed {
                task_id: task_id.clone(),
            },
            (Submitting | Polling { .. }, Cancelled) => Idle,
            (Failed { .. }, Retry) => Idle,

            // ========== Default: No transition ==========
            _ => state.clone(),
        }
    }

    /// Check if a transition is valid without executing it.
    pub fn can_transition(&self, event: &StepEvent) -> bool {
        let next = self.compute_next_state(&self.current_state, event);
        next != self.current_state
    }

    /// Reset to Idle state.
    pub fn reset(&mut self) {
        self.current_state = StepState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polling_machine() -> StateMachine {
        let mut sm = StateMachine::new();
        sm.handle_event(StepEvent::SubmitRequested);
        sm.handle_event(StepEvent::Submitted {
            task_id: "t1".to_string(),
        });
        sm
    }

    #[test]
    fn test_success_flow() {
        let mut sm = polling_machine();
        assert_eq!(
            sm.state(),
            &StepState::Polling {
                task_id: "t1".to_string()
            }
        );

        let t = sm.handle_event(StepEvent::TaskSucceeded);
        assert!(t.changed);
        assert_eq!(
            sm.state(),
            &StepState::Succeeded {
                task_id: "t1".to_string()
            }
        );

        sm.try_handle_event(StepEvent::ResultRecorded).unwrap();
        assert_eq!(
            sm.state(),
            &StepState::Completed {
                task_id: "t1".to_string()
            }
        );
    }

    #[test]
    fn test_result_cannot_be_recorded_before_success() {
        let mut sm = polling_machine();
        let err = sm.try_handle_event(StepEvent::ResultRecorded).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: StepState::Polling {
                    task_id: "t1".to_string()
                },
                event: "result_recorded".to_string(),
            }
        );
    }

    #[test]
    fn test_succeeded_step_is_not_cancelled() {
        let mut sm = polling_machine();
        sm.handle_event(StepEvent::TaskSucceeded);
        assert!(!sm.can_transition(&StepEvent::Cancelled));
        assert!(!sm.can_transition(&StepEvent::SubmitRequested));
    }

    #[test]
    fn test_failure_requires_retry() {
        let mut sm = polling_machine();
        sm.handle_event(StepEvent::TaskFailed {
            message: "quota exceeded".to_string(),
        });
        assert!(matches!(
            sm.state(),
            StepState::Failed { error_message, .. } if error_message == "quota exceeded"
        ));

        // A new submission is not accepted until the caller retries.
        let t = sm.handle_event(StepEvent::SubmitRequested);
        assert!(!t.changed);
        assert!(sm.try_handle_event(StepEvent::SubmitRequested).is_err());

        sm.handle_event(StepEvent::Retry);
        assert_eq!(sm.state(), &StepState::Idle);
        assert!(sm.can_transition(&StepEvent::SubmitRequested));
    }

    #[test]
    fn test_duplicate_submit_rejected() {
        let mut sm = StateMachine::new();
        sm.try_handle_event(StepEvent::SubmitRequested).unwrap();
        let err = sm.try_handle_event(StepEvent::SubmitRequested).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: StepState::Submitting,
                event: "submit_requested".to_string(),
            }
        );
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut sm = polling_machine();
        sm.handle_event(StepEvent::Cancelled);
        assert_eq!(sm.state(), &StepState::Idle);
    }

    #[test]
    fn test_no_backward_transition_from_completed() {
        let mut sm = polling_machine();
        sm.handle_event(StepEvent::TaskSucceeded);
        sm.handle_event(StepEvent::ResultRecorded);
        for event in [
            StepEvent::Retry,
            StepEvent::Cancelled,
            StepEvent::SubmitRequested,
            StepEvent::TaskFailed {
                message: "late".to_string(),
            },
        ] {
            assert!(!sm.can_transition(&event));
        }
    }

    #[test]
    fn test_history_tracking() {
        let sm = polling_machine();
        assert_eq!(sm.history().len(), 2);

        let mut sm = StateMachine::new();
        for _ in 0..60 {
            sm.handle_event(StepEvent::Retry);
        }
        assert_eq!(sm.history().len(), 50);
    }
}
