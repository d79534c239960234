use async_trait::async_trait;
use serde_json::Value;
use task_core::{Submission, SubmissionError, TaskSnapshot, TransportError};

/// Transport seam between the workflow engine and the remote task service.
///
/// Implementations are injected into the poller and the controller, so tests
/// and offline demos can swap in a scripted backend.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Issues exactly one submission request. Never retried.
    async fn submit(&self, endpoint: &str, payload: &Value) -> Result<Submission, SubmissionError>;

    /// Reads the current status of a task. Idempotent.
    async fn task_status(&self, task_id: &str) -> Result<TaskSnapshot, TransportError>;

    /// Asks the service to stop working on a task.
    async fn cancel_task(&self, task_id: &str) -> Result<(), TransportError>;
}
