//! Scripted in-memory task service.
//!
//! Stands in for endpoints that are not deployed yet and backs the engine's
//! tests. Each endpoint gets a script of status responses that a submitted
//! task walks through, one entry per status read. Every call is recorded so
//! tests can assert on request ordering and overlap.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use task_core::{
    StatusResponse, Submission, SubmissionError, TaskSnapshot, TaskStatus, TransportError,
};

use crate::api::TaskApi;

/// One recorded call against the simulated service.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Submit { endpoint: String, payload: Value },
    Status { task_id: String },
    Cancel { task_id: String },
}

#[derive(Debug, Clone)]
enum ScriptEntry {
    Respond(StatusResponse),
    Fail(TransportError),
}

/// Sequence of status reads a simulated task answers with.
///
/// Once exhausted, the last response is repeated.
#[derive(Debug, Clone, Default)]
pub struct TaskScript {
    entries: Vec<ScriptEntry>,
}

impl TaskScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, response: StatusResponse) -> Self {
        self.entries.push(ScriptEntry::Respond(response));
        self
    }

    pub fn pending(self) -> Self {
        self.respond(status(TaskStatus::Pending, 0, 0, "queued"))
    }

    pub fn running(self, current: u64, total: u64) -> Self {
        self.respond(status(TaskStatus::Running, current, total, "processing"))
    }

    pub fn success(self, result: Value) -> Self {
        let mut response = status(TaskStatus::Success, 100, 100, "done");
        response.result = Some(result);
        self.respond(response)
    }

    pub fn failure(self, message: &str) -> Self {
        let mut response = status(TaskStatus::Failure, 0, 100, message);
        response.error = Some(Value::String(message.to_string()));
        self.respond(response)
    }

    /// The next status read fails at the transport level.
    pub fn transport_error(mut self) -> Self {
        self.entries.push(ScriptEntry::Fail(TransportError::Status {
            url: "simulated://status".to_string(),
            status: 503,
            body: "service unavailable".to_string(),
        }));
        self
    }
}

fn status(status: TaskStatus, current: u64, total: u64, message: &str) -> StatusResponse {
    StatusResponse {
        status,
        current,
        total,
        message: Some(message.to_string()),
        result: None,
        error: None,
    }
}

#[derive(Debug)]
struct RunningTask {
    remaining: VecDeque<ScriptEntry>,
    last: Option<ScriptEntry>,
}

#[derive(Debug, Default)]
struct SimulatorState {
    scripts: HashMap<String, VecDeque<TaskScript>>,
    rejections: HashMap<String, SubmissionError>,
    tasks: HashMap<String, RunningTask>,
    calls: Vec<ApiCall>,
    next_id: u64,
}

/// In-memory `TaskApi` driven by per-endpoint scripts.
#[derive(Debug, Default)]
pub struct SimulatedTaskApi {
    state: Mutex<SimulatorState>,
    status_latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SimulatedTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a script for the next task submitted to `endpoint`.
    ///
    /// Several scripts for the same endpoint are consumed in order, which
    /// lets a test script a failed attempt followed by a retry.
    pub fn script(self, endpoint: &str, script: TaskScript) -> Self {
        self.lock()
            .scripts
            .entry(endpoint.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Makes the next submission to `endpoint` fail with `error`.
    pub fn reject(self, endpoint: &str, error: SubmissionError) -> Self {
        self.lock().rejections.insert(endpoint.to_string(), error);
        self
    }

    /// Delay applied to each status read, to widen overlap windows in tests.
    pub fn with_status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn status_calls(&self, task_id: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ApiCall::Status { task_id: id } if id == task_id))
            .count()
    }

    pub fn submit_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ApiCall::Submit { .. }))
            .count()
    }

    /// Highest number of status reads that were in flight at the same time.
    pub fn max_concurrent_status_reads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, SimulatorState> {
        // A poisoned lock only means a test panicked mid-call; the recorded
        // state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_entry(&self, task_id: &str) -> Result<StatusResponse, TransportError> {
        let mut state = self.lock();
        let Some(task) = state.tasks.get_mut(task_id) else {
            return Err(TransportError::Status {
                url: format!("simulated://status/{task_id}"),
                status: 404,
                body: format!("unknown task {task_id}"),
            });
        };
        let entry = match task.remaining.pop_front() {
            Some(entry) => {
                task.last = Some(entry.clone());
                entry
            }
            None => task
                .last
                .clone()
                .unwrap_or_else(|| ScriptEntry::Respond(status(TaskStatus::Pending, 0, 0, ""))),
        };
        match entry {
            ScriptEntry::Respond(response) => Ok(response),
            ScriptEntry::Fail(error) => Err(error),
        }
    }
}

/// Counts a status read as in flight until dropped, including when the
/// read's future is abandoned mid-flight.
struct InFlightRead<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightRead<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightRead<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskApi for SimulatedTaskApi {
    async fn submit(&self, endpoint: &str, payload: &Value) -> Result<Submission, SubmissionError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Submit {
            endpoint: endpoint.to_string(),
            payload: payload.clone(),
        });
        if let Some(error) = state.rejections.remove(endpoint) {
            return Err(error);
        }

        state.next_id += 1;
        let task_id = format!("sim-task-{}", state.next_id);
        let script = state
            .scripts
            .get_mut(endpoint)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default();
        state.tasks.insert(
            task_id.clone(),
            RunningTask {
                remaining: script.entries.into(),
                last: None,
            },
        );
        log::debug!("Simulated submission to {} created {}", endpoint, task_id);

        Ok(Submission {
            task_id,
            project_id: None,
            metadata: Default::default(),
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskSnapshot, TransportError> {
        self.lock().calls.push(ApiCall::Status {
            task_id: task_id.to_string(),
        });

        let _in_flight = InFlightRead::enter(&self.in_flight, &self.max_in_flight);
        if !self.status_latency.is_zero() {
            tokio::time::sleep(self.status_latency).await;
        }
        let outcome = self.next_entry(task_id);

        outcome.map(|response| TaskSnapshot::from_response(task_id, response))
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Cancel {
            task_id: task_id.to_string(),
        });
        state.tasks.remove(task_id);
        Ok(())
    }
}
