//! Task wire types
//!
//! A task is owned by the remote service. The client only ever reads
//! snapshots of it, so nothing here exposes mutation beyond construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Status of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted by the service, not yet picked up by a worker.
    Pending,
    /// A worker is processing the task.
    Running,
    /// Finished; `result` carries the payload.
    Success,
    /// Finished; `error` and `message` describe why.
    Failure,
}

impl TaskStatus {
    /// `success` and `failure` are the only statuses after which polling stops.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // Worker queues report PROGRESS/STARTED while a task runs.
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => Ok(Self::Pending),
            "running" | "progress" | "started" => Ok(Self::Running),
            "success" | "completed" => Ok(Self::Success),
            "failure" | "failed" => Ok(Self::Failure),
            other => Err(format!("unknown task status: {other:?}")),
        }
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Progress counter reported by the service. `current` never exceeds `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    current: u64,
    total: u64,
}

impl Progress {
    /// Builds a progress pair, clamping `current` to `total`.
    pub fn new(current: u64, total: u64) -> Self {
        Self {
            current: current.min(total),
            total,
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whole-number percentage, `None` while the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        Some((self.current.saturating_mul(100) / self.total).min(100) as u8)
    }
}

/// Body of `GET /api/tasks/status/{task_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// A point-in-time view of a remote task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: Progress,
    pub message: String,
    /// Present only when `status == Success`.
    pub result: Option<Value>,
    /// Present only when `status == Failure`.
    pub error: Option<Value>,
}

impl TaskSnapshot {
    /// Normalizes a status response into a snapshot.
    ///
    /// `result` is dropped unless the task succeeded and `error` is dropped
    /// unless it failed, so consumers can rely on the pairing.
    pub fn from_response(task_id: impl Into<String>, response: StatusResponse) -> Self {
        let task_id = task_id.into();
        if response.current > response.total {
            log::warn!(
                "[{}] progress {} exceeds total {}, clamping",
                task_id,
                response.current,
                response.total
            );
        }
        let result = match response.status {
            TaskStatus::Success => response.result,
            _ => None,
        };
        let error = match response.status {
            TaskStatus::Failure => response.error,
            _ => None,
        };
        Self {
            task_id,
            status: response.status,
            progress: Progress::new(response.current, response.total),
            message: response.message.unwrap_or_default(),
            result,
            error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Human readable failure reason: the message, else the error payload.
    pub fn failure_reason(&self) -> String {
        if !self.message.is_empty() {
            return self.message.clone();
        }
        match &self.error {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "task failed without a message".to_string(),
        }
    }
}

/// Receipt for a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub task_id: String,
    /// Some endpoints create a project alongside the task.
    pub project_id: Option<String>,
    /// Any other fields the endpoint returned.
    pub metadata: Map<String, Value>,
}

impl Submission {
    /// Extracts the receipt from a submission response body.
    ///
    /// Returns `None` when the body carries no usable task identifier.
    pub fn from_body(body: Value) -> Option<Self> {
        let Value::Object(mut fields) = body else {
            return None;
        };
        let task_id = ["task_id", "taskId", "id"]
            .iter()
            .find_map(|key| fields.remove(*key).and_then(id_from_value))?;
        let project_id = ["project_id", "projectId"]
            .iter()
            .find_map(|key| fields.remove(*key).and_then(id_from_value));
        Some(Self {
            task_id,
            project_id,
            metadata: fields,
        })
    }
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
