//! Workflow-related type definitions

use std::collections::HashSet;

use step_state::TransitionError;
use task_core::{PollingError, ProjectionError, SubmissionError, TaskFailure};
use thiserror::Error;

use super::step::StepDefinition;

/// Workflow execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Polling(#[from] PollingError),

    #[error(transparent)]
    TaskFailed(#[from] TaskFailure),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Step {step} already has a task in flight")]
    DuplicateSubmission {
        step: String,
        task_id: Option<String>,
    },

    #[error("Step {step} failed and must be retried first: {message}")]
    RetryRequired { step: String, message: String },

    #[error("Cannot {action} step {step} while it is {state}")]
    InvalidState {
        step: String,
        state: &'static str,
        action: &'static str,
    },

    #[error("Workflow has not been started")]
    NotStarted,

    #[error("Workflow is already running; reset it before starting again")]
    AlreadyStarted,

    #[error("Workflow is already complete")]
    WorkflowComplete,

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Expected a result for step {expected}, got one for {found}")]
    StepMismatch { expected: String, found: String },

    #[error("Step {step} returned a result that does not match its declared shape: {message}")]
    InvalidResult { step: String, message: String },
}

impl WorkflowError {
    /// Whether the failure came from cancelling the active poll.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Polling(PollingError::Cancelled { .. }))
    }
}

/// The validated, static definition of a workflow.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition<I, O> {
    name: String,
    steps: Vec<StepDefinition<I, O>>,
}

impl<I, O> WorkflowDefinition<I, O> {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder<I, O> {
        WorkflowBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDefinition<I, O>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition<I, O>> {
        self.steps.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }
}

/// Collects steps and validates them into a `WorkflowDefinition`.
#[derive(Debug)]
pub struct WorkflowBuilder<I, O> {
    name: String,
    steps: Vec<StepDefinition<I, O>>,
}

impl<I, O> WorkflowBuilder<I, O> {
    pub fn step(mut self, step: StepDefinition<I, O>) -> Self {
        self.steps.push(step);
        self
    }

    /// Checks that every step's input can be produced from the previous
    /// step's result, so mismatches fail here rather than mid-run.
    pub fn build(self) -> Result<WorkflowDefinition<I, O>, ProjectionError> {
        if self.steps.is_empty() {
            return Err(ProjectionError::EmptyWorkflow {
                workflow: self.name,
            });
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(ProjectionError::EmptyStepName {
                    workflow: self.name.clone(),
                    index,
                });
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ProjectionError::DuplicateStep {
                    workflow: self.name.clone(),
                    step: step.name.clone(),
                });
            }

            match (index, &step.projector) {
                (0, None) => {}
                (0, Some(_)) => {
                    return Err(ProjectionError::UnexpectedProjection {
                        step: step.name.clone(),
                    })
                }
                (_, None) => {
                    return Err(ProjectionError::MissingProjection {
                        step: step.name.clone(),
                    })
                }
                (_, Some(projector)) => {
                    let produced = self.steps[index - 1].produces;
                    if projector.accepts() != produced {
                        return Err(ProjectionError::ShapeMismatch {
                            step: step.name.clone(),
                            expected: projector.accepts().to_string(),
                            found: produced.to_string(),
                        });
                    }
                }
            }
        }

        Ok(WorkflowDefinition {
            name: self.name,
            steps: self.steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::ResultProjector;
    use serde_json::Value;

    type Def = StepDefinition<String, Value>;

    fn projector(accepts: &'static str) -> ResultProjector<String, Value> {
        ResultProjector::new(accepts, |value: &Value| Some(value.to_string()))
    }

    #[test]
    fn builds_chain_with_matching_shapes() {
        let definition = WorkflowDefinition::builder("demo")
            .step(Def::initial("a", "/api/a", "alpha"))
            .step(Def::projected("b", "/api/b", "beta", projector("alpha")))
            .build()
            .unwrap();
        assert_eq!(definition.len(), 2);
        assert_eq!(definition.position("b"), Some(1));
        assert_eq!(definition.position("zzz"), None);
    }

    #[test]
    fn rejects_empty_workflow() {
        let err = WorkflowDefinition::<String, Value>::builder("demo")
            .build()
            .unwrap_err();
        assert!(matches!(err, ProjectionError::EmptyWorkflow { .. }));
    }

    #[test]
    fn rejects_duplicate_and_blank_names() {
        let err = WorkflowDefinition::builder("demo")
            .step(Def::initial("a", "/api/a", "alpha"))
            .step(Def::projected("a", "/api/b", "beta", projector("alpha")))
            .build()
            .unwrap_err();
        assert!(matches!(err, ProjectionError::DuplicateStep { step, .. } if step == "a"));

        let err = WorkflowDefinition::builder("demo")
            .step(Def::initial(" ", "/api/a", "alpha"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ProjectionError::EmptyStepName { index: 0, .. }));
    }

    #[test]
    fn rejects_shape_mismatch_at_definition_time() {
        let err = WorkflowDefinition::builder("demo")
            .step(Def::initial("a", "/api/a", "alpha"))
            .step(Def::projected("b", "/api/b", "beta", projector("gamma")))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ProjectionError::ShapeMismatch {
                step: "b".to_string(),
                expected: "gamma".to_string(),
                found: "alpha".to_string(),
            }
        );
    }

    #[test]
    fn rejects_missing_and_unexpected_projections() {
        let err = WorkflowDefinition::builder("demo")
            .step(Def::initial("a", "/api/a", "alpha"))
            .step(Def::initial("b", "/api/b", "beta"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ProjectionError::MissingProjection { .. }));

        let err = WorkflowDefinition::builder("demo")
            .step(Def::projected("a", "/api/a", "alpha", projector("alpha")))
            .build()
            .unwrap_err();
        assert!(matches!(err, ProjectionError::UnexpectedProjection { .. }));
    }
}
