use serde_json::Value;
use thiserror::Error;

/// A single failed HTTP exchange with the task service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

/// Failure to create a task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("Submission failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Submission to {endpoint} returned no task identifier")]
    MissingTaskId { endpoint: String },

    #[error("Failed to encode payload for {endpoint}: {message}")]
    Encode { endpoint: String, message: String },
}

/// Polling stopped without observing a terminal status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollingError {
    #[error("Gave up polling task {task_id} after {attempts} consecutive failures: {last_error}")]
    TransportExhausted {
        task_id: String,
        attempts: u32,
        last_error: TransportError,
    },

    #[error("Polling of task {task_id} was cancelled")]
    Cancelled { task_id: String },
}

/// The service reported a terminal `failure` status.
///
/// This is a business outcome, not a transport error, and is never retried
/// automatically.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Task {task_id} failed: {message}")]
pub struct TaskFailure {
    pub task_id: String,
    pub message: String,
    pub error: Option<Value>,
}

/// Workflow misconfiguration: a step result cannot feed the next step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Workflow {workflow} declares no steps")]
    EmptyWorkflow { workflow: String },

    #[error("Step {index} of workflow {workflow} has an empty name")]
    EmptyStepName { workflow: String, index: usize },

    #[error("Step name {step} is declared twice in workflow {workflow}")]
    DuplicateStep { workflow: String, step: String },

    #[error("Step {step} has no projection from the previous step's result")]
    MissingProjection { step: String },

    #[error("First step {step} takes the workflow input and cannot declare a projection")]
    UnexpectedProjection { step: String },

    #[error("Step {step} expects a {expected} result but the previous step produces {found}")]
    ShapeMismatch {
        step: String,
        expected: String,
        found: String,
    },

    #[error("Step {step} could not map a {shape} result into its input")]
    Unmappable { step: String, shape: String },
}
