//! Workflow step controller
//!
//! Drives a validated `WorkflowDefinition` one step at a time. Each step has
//! its own `StateMachine`; the cursor only moves forward when the current
//! step's task succeeds and its result has been projected into the next
//! step's input.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use step_state::{StateMachine, StepEvent, StepState};
use task_client::TaskApi;
use task_core::{PollConfig, PollingError, ProjectionError, Submission, TaskFailure, TaskStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::WorkflowEvent;
use crate::poller::TaskPoller;
use crate::submitter::TaskSubmitter;
use crate::types::{StepInput, StepOutput, WorkflowDefinition, WorkflowError};

/// Outcome of `WorkflowStepController::advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The cursor moved from one step to the next.
    Moved { from: String, to: String },
    /// The last step was recorded; the workflow is complete.
    Completed,
    /// The step had already been advanced past. Nothing changed.
    AlreadyAdvanced,
}

/// Decoded success payload of a step's task.
#[derive(Debug, Clone)]
pub struct StepResult<O> {
    pub step: String,
    pub task_id: String,
    pub result: O,
}

/// One step driven end to end by `run_step`.
#[derive(Debug, Clone)]
pub struct StepRun<O> {
    pub step: String,
    pub task_id: String,
    pub project_id: Option<String>,
    pub result: O,
}

pub struct WorkflowStepController<I: StepInput, O: StepOutput> {
    run_id: Uuid,
    definition: WorkflowDefinition<I, O>,
    api: Arc<dyn TaskApi>,
    submitter: TaskSubmitter,
    poller: TaskPoller,
    cursor: usize,
    machines: Vec<StateMachine>,
    inputs: Vec<Option<I>>,
    submissions: Vec<Option<Submission>>,
    /// Decoded results of succeeded tasks not yet recorded by `advance`.
    pending: Vec<Option<O>>,
    results: HashMap<String, O>,
    complete: bool,
    cancel_token: CancellationToken,
    cancel_remote: bool,
    events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl<I: StepInput, O: StepOutput> WorkflowStepController<I, O> {
    pub fn new(definition: WorkflowDefinition<I, O>, api: Arc<dyn TaskApi>, poll: PollConfig) -> Self {
        let len = definition.len();
        Self {
            run_id: Uuid::new_v4(),
            submitter: TaskSubmitter::new(api.clone()),
            poller: TaskPoller::new(api.clone(), poll),
            api,
            definition,
            cursor: 0,
            machines: vec![StateMachine::new(); len],
            inputs: vec![None; len],
            submissions: vec![None; len],
            pending: vec![None; len],
            results: HashMap::new(),
            complete: false,
            cancel_token: CancellationToken::new(),
            cancel_remote: false,
            events: None,
        }
    }

    /// Sends every `WorkflowEvent` to `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Also asks the service to cancel the task when a step is cancelled.
    pub fn with_remote_cancel(mut self, enabled: bool) -> Self {
        self.cancel_remote = enabled;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn definition(&self) -> &WorkflowDefinition<I, O> {
        &self.definition
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Name of the step under the cursor, `None` once the workflow is complete.
    pub fn current_step(&self) -> Option<&str> {
        if self.complete {
            return None;
        }
        self.definition.step(self.cursor).map(|step| step.name.as_str())
    }

    pub fn current_state(&self) -> &StepState {
        self.machines[self.cursor].state()
    }

    pub fn step_state(&self, step: &str) -> Option<&StepState> {
        self.definition
            .position(step)
            .map(|index| self.machines[index].state())
    }

    /// Transition history of a step's state machine.
    pub fn step_history(&self, step: &str) -> Option<&[step_state::StateTransition]> {
        self.definition
            .position(step)
            .map(|index| self.machines[index].history())
    }

    pub fn current_input(&self) -> Option<&I> {
        self.inputs[self.cursor].as_ref()
    }

    pub fn results(&self) -> &HashMap<String, O> {
        &self.results
    }

    pub fn result(&self, step: &str) -> Option<&O> {
        self.results.get(step)
    }

    /// Token that aborts the active poll when cancelled.
    ///
    /// Clone it before awaiting `poll`/`run_step` to cancel from another task.
    /// A cancelled token is replaced once the cancellation has been handled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Seeds the first step's payload.
    pub fn start(&mut self, input: I) -> Result<(), WorkflowError> {
        if self.inputs[0].is_some() {
            return Err(WorkflowError::AlreadyStarted);
        }
        info!(
            "[{}] starting workflow {} at step {}",
            self.run_id,
            self.definition.name(),
            self.definition.steps()[0].name
        );
        self.inputs[0] = Some(input);
        Ok(())
    }

    /// Submits the current step's task.
    ///
    /// Rejected without any request when the step already has a task, has
    /// failed, or the workflow is complete.
    pub async fn submit(&mut self) -> Result<Submission, WorkflowError> {
        if self.complete {
            return Err(WorkflowError::WorkflowComplete);
        }
        let index = self.cursor;
        let step = self.definition.steps()[index].name.clone();

        let state = self.machines[index].state();
        if !state.accepts_submission() {
            let rejection = match state {
                StepState::Submitting | StepState::Polling { .. } => {
                    WorkflowError::DuplicateSubmission {
                        step,
                        task_id: state.task_id().map(str::to_string),
                    }
                }
                StepState::Failed { error_message, .. } => WorkflowError::RetryRequired {
                    step,
                    message: error_message.clone(),
                },
                other => WorkflowError::InvalidState {
                    step,
                    state: other.label(),
                    action: "submit",
                },
            };
            warn!("[{}] submission rejected: {}", self.run_id, rejection);
            return Err(rejection);
        }

        let Some(input) = self.inputs[index].clone() else {
            return Err(WorkflowError::NotStarted);
        };
        let endpoint = self.definition.steps()[index].endpoint.clone();

        self.transition(index, StepEvent::SubmitRequested)?;
        match self.submitter.submit(&endpoint, &input).await {
            Ok(submission) => {
                self.transition(index, StepEvent::Submitted {
                    task_id: submission.task_id.clone(),
                })?;
                self.submissions[index] = Some(submission.clone());
                self.emit(WorkflowEvent::StepSubmitted {
                    step,
                    task_id: submission.task_id.clone(),
                });
                Ok(submission)
            }
            Err(e) => {
                self.mark_failed(index, StepEvent::SubmissionFailed {
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    /// Polls the current step's task until it is terminal.
    ///
    /// On success the step moves to `succeeded` and holds the decoded result
    /// until `advance` records it. Polling a succeeded step again returns
    /// that result without another status read. A reported failure marks
    /// the step failed and freezes the cursor.
    pub async fn poll(&mut self) -> Result<StepResult<O>, WorkflowError> {
        if self.complete {
            return Err(WorkflowError::WorkflowComplete);
        }
        let index = self.cursor;
        let definition = &self.definition.steps()[index];
        let step = definition.name.clone();
        let produces = definition.produces;

        let task_id = match self.machines[index].state() {
            StepState::Polling { task_id } => task_id.clone(),
            StepState::Succeeded { task_id } => {
                if let Some(result) = &self.pending[index] {
                    debug!("[{}] {} already succeeded", task_id, step);
                    return Ok(StepResult {
                        step,
                        task_id: task_id.clone(),
                        result: result.clone(),
                    });
                }
                return Err(WorkflowError::InvalidState {
                    step,
                    state: "succeeded",
                    action: "poll",
                });
            }
            StepState::Failed { error_message, .. } => {
                return Err(WorkflowError::RetryRequired {
                    step,
                    message: error_message.clone(),
                })
            }
            state => {
                return Err(WorkflowError::InvalidState {
                    step,
                    state: state.label(),
                    action: "poll",
                })
            }
        };

        let cancel = self.cancel_token.clone();
        let events = self.events.clone();
        let outcome = self
            .poller
            .poll(&task_id, &cancel, |snapshot| {
                if let Some(tx) = &events {
                    let event = WorkflowEvent::StepProgress {
                        step: step.clone(),
                        snapshot: snapshot.clone(),
                    };
                    if tx.send(event).is_err() {
                        debug!("[{}] event receiver dropped", snapshot.task_id);
                    }
                }
            })
            .await;

        match outcome {
            Ok(snapshot) if snapshot.status == TaskStatus::Success => {
                let raw = snapshot.result.unwrap_or(serde_json::Value::Null);
                match O::decode(produces, raw) {
                    Ok(result) => {
                        self.transition(index, StepEvent::TaskSucceeded)?;
                        self.pending[index] = Some(result.clone());
                        Ok(StepResult {
                            step,
                            task_id,
                            result,
                        })
                    }
                    Err(e) => {
                        let message = format!("expected {} result: {}", produces, e);
                        error!("[{}] {} returned an invalid result: {}", task_id, step, message);
                        self.mark_failed(index, StepEvent::TaskFailed {
                            message: message.clone(),
                        })?;
                        Err(WorkflowError::InvalidResult { step, message })
                    }
                }
            }
            Ok(snapshot) => {
                let failure = TaskFailure {
                    task_id,
                    message: snapshot.failure_reason(),
                    error: snapshot.error,
                };
                self.fail(&step, failure.clone())?;
                Err(failure.into())
            }
            Err(e @ PollingError::Cancelled { .. }) => {
                self.handle_cancelled(index).await?;
                Err(e.into())
            }
            Err(e) => {
                self.mark_failed(index, StepEvent::PollingAborted {
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    /// Records `result` for `step`, projects the next step's input and moves
    /// the cursor.
    ///
    /// Only a step whose task was observed to succeed can be advanced.
    /// Advancing a step the cursor has already passed is a no-op.
    pub fn advance(&mut self, step: &str, result: O) -> Result<Advance, WorkflowError> {
        let index = self
            .definition
            .position(step)
            .ok_or_else(|| WorkflowError::UnknownStep(step.to_string()))?;

        if index < self.cursor || (self.complete && index == self.cursor) {
            debug!("[{}] {} already advanced", self.run_id, step);
            return Ok(Advance::AlreadyAdvanced);
        }
        if index > self.cursor {
            return Err(WorkflowError::StepMismatch {
                expected: self.definition.steps()[self.cursor].name.clone(),
                found: step.to_string(),
            });
        }

        let task_id = match self.machines[index].state() {
            StepState::Succeeded { task_id } => task_id.clone(),
            StepState::Failed { error_message, .. } => {
                return Err(WorkflowError::RetryRequired {
                    step: step.to_string(),
                    message: error_message.clone(),
                })
            }
            state => {
                return Err(WorkflowError::InvalidState {
                    step: step.to_string(),
                    state: state.label(),
                    action: "advance",
                })
            }
        };

        let produces = self.definition.steps()[index].produces;
        if result.shape() != produces {
            return Err(ProjectionError::ShapeMismatch {
                step: step.to_string(),
                expected: produces.to_string(),
                found: result.shape().to_string(),
            }
            .into());
        }

        let next_input = match self.definition.step(index + 1) {
            Some(next) => {
                let projected = match &next.projector {
                    Some(projector) => projector.project(&next.name, &result),
                    None => Err(ProjectionError::MissingProjection {
                        step: next.name.clone(),
                    }),
                };
                match projected {
                    Ok(input) => Some(input),
                    Err(e) => {
                        self.mark_failed(index, StepEvent::TaskFailed {
                            message: e.to_string(),
                        })?;
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        self.transition(index, StepEvent::ResultRecorded)?;
        self.pending[index] = None;
        self.results.insert(step.to_string(), result);
        self.emit(WorkflowEvent::StepCompleted {
            step: step.to_string(),
            task_id,
        });

        match next_input {
            Some(input) => {
                self.cursor = index + 1;
                self.inputs[self.cursor] = Some(input);
                let to = self.definition.steps()[self.cursor].name.clone();
                info!("[{}] {} -> {}", self.run_id, step, to);
                self.emit(WorkflowEvent::StepReady { step: to.clone() });
                Ok(Advance::Moved {
                    from: step.to_string(),
                    to,
                })
            }
            None => {
                self.complete = true;
                info!(
                    "[{}] workflow {} complete",
                    self.run_id,
                    self.definition.name()
                );
                self.emit(WorkflowEvent::WorkflowCompleted {
                    workflow: self.definition.name().to_string(),
                });
                Ok(Advance::Completed)
            }
        }
    }

    /// Records a business failure reported for `step`. The cursor stays put.
    pub fn fail(&mut self, step: &str, failure: TaskFailure) -> Result<(), WorkflowError> {
        let index = self
            .definition
            .position(step)
            .ok_or_else(|| WorkflowError::UnknownStep(step.to_string()))?;
        if index != self.cursor || self.complete {
            return Err(WorkflowError::StepMismatch {
                expected: self.current_step().unwrap_or_default().to_string(),
                found: step.to_string(),
            });
        }

        match self.machines[index].state() {
            StepState::Polling { .. } => {
                warn!("{}", failure);
                self.mark_failed(index, StepEvent::TaskFailed {
                    message: failure.message,
                })
            }
            StepState::Failed { .. } => Ok(()),
            state => Err(WorkflowError::InvalidState {
                step: step.to_string(),
                state: state.label(),
                action: "fail",
            }),
        }
    }

    /// Moves the failed current step back to `idle`, keeping its input.
    pub fn retry(&mut self) -> Result<(), WorkflowError> {
        let index = self.cursor;
        if self.complete || !matches!(self.machines[index].state(), StepState::Failed { .. }) {
            return Err(WorkflowError::InvalidState {
                step: self.definition.steps()[index].name.clone(),
                state: if self.complete {
                    "completed"
                } else {
                    self.machines[index].state().label()
                },
                action: "retry",
            });
        }
        info!(
            "[{}] retrying {}",
            self.run_id,
            self.definition.steps()[index].name
        );
        self.transition(index, StepEvent::Retry)?;
        self.submissions[index] = None;
        Ok(())
    }

    /// Cancels the current step's task, returning it to `idle`.
    ///
    /// Returns `false` when the step has no active task.
    pub async fn cancel(&mut self) -> Result<bool, WorkflowError> {
        if self.complete || !self.machines[self.cursor].state().is_active() {
            return Ok(false);
        }
        self.cancel_token.cancel();
        self.handle_cancelled(self.cursor).await?;
        Ok(true)
    }

    /// Discards all progress. `start` must be called again.
    pub fn reset(&mut self) {
        info!("[{}] resetting workflow {}", self.run_id, self.definition.name());
        self.cancel_token.cancel();
        self.cancel_token = CancellationToken::new();
        self.cursor = 0;
        self.complete = false;
        self.results.clear();
        for machine in &mut self.machines {
            machine.reset();
        }
        for input in &mut self.inputs {
            *input = None;
        }
        for submission in &mut self.submissions {
            *submission = None;
        }
        for pending in &mut self.pending {
            *pending = None;
        }
    }

    /// Submits, polls and advances the current step.
    pub async fn run_step(&mut self) -> Result<StepRun<O>, WorkflowError> {
        let submission = self.submit().await?;
        let outcome = self.poll().await?;
        self.advance(&outcome.step, outcome.result.clone())?;
        Ok(StepRun {
            step: outcome.step,
            task_id: outcome.task_id,
            project_id: submission.project_id,
            result: outcome.result,
        })
    }

    /// Runs the remaining steps in order, stopping at the first error.
    pub async fn run_to_completion(&mut self) -> Result<Vec<StepRun<O>>, WorkflowError> {
        let mut runs = Vec::new();
        while !self.complete {
            runs.push(self.run_step().await?);
        }
        Ok(runs)
    }

    fn transition(&mut self, index: usize, event: StepEvent) -> Result<(), WorkflowError> {
        self.machines[index].try_handle_event(event)?;
        Ok(())
    }

    fn mark_failed(&mut self, index: usize, event: StepEvent) -> Result<(), WorkflowError> {
        let message = match &event {
            StepEvent::TaskFailed { message } => message.clone(),
            StepEvent::PollingAborted { error } | StepEvent::SubmissionFailed { error } => {
                error.clone()
            }
            other => other.name().to_string(),
        };
        self.transition(index, event)?;
        self.pending[index] = None;
        self.emit(WorkflowEvent::StepFailed {
            step: self.definition.steps()[index].name.clone(),
            message,
        });
        Ok(())
    }

    async fn handle_cancelled(&mut self, index: usize) -> Result<(), WorkflowError> {
        let task_id = self.machines[index].state().task_id().map(str::to_string);
        let step = self.definition.steps()[index].name.clone();
        info!("[{}] cancelled {} (task {:?})", self.run_id, step, task_id);

        self.transition(index, StepEvent::Cancelled)?;
        self.submissions[index] = None;
        self.cancel_token = CancellationToken::new();
        self.emit(WorkflowEvent::StepCancelled { step });

        if self.cancel_remote {
            if let Some(task_id) = task_id {
                if let Err(e) = self.api.cancel_task(&task_id).await {
                    warn!("[{}] remote cancel failed: {}", task_id, e);
                }
            }
        }
        Ok(())
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!("[{}] event receiver dropped", self.run_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::video_book::{self, VideoBookInput, VideoBookOutput};
    use serde_json::json;
    use std::time::Duration;
    use task_client::{ApiCall, SimulatedTaskApi, TaskScript};

    const EXTRACT: &str = "/api/video/extract-transcript";

    type Controller = WorkflowStepController<VideoBookInput, VideoBookOutput>;

    fn controller(api: Arc<SimulatedTaskApi>) -> Controller {
        WorkflowStepController::new(
            video_book::definition().unwrap(),
            api,
            PollConfig {
                interval: Duration::from_millis(2000),
                max_consecutive_failures: 2,
                max_backoff: Duration::from_secs(30),
            },
        )
    }

    fn transcript(text: &str) -> VideoBookOutput {
        VideoBookOutput::Transcript {
            transcript: text.to_string(),
            language: None,
        }
    }

    #[tokio::test]
    async fn submit_before_start_is_rejected() {
        let api = Arc::new(SimulatedTaskApi::new());
        let mut controller = controller(api.clone());
        let err = controller.submit().await.unwrap_err();
        assert_eq!(err, WorkflowError::NotStarted);
        assert_eq!(api.submit_calls(), 0);
        assert_eq!(controller.current_state(), &StepState::Idle);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut controller = controller(Arc::new(SimulatedTaskApi::new()));
        controller.start(VideoBookInput::from_video("a")).unwrap();
        assert_eq!(
            controller.start(VideoBookInput::from_video("b")),
            Err(WorkflowError::AlreadyStarted)
        );
    }

    #[tokio::test]
    async fn advance_rejects_unknown_and_future_steps() {
        let api = Arc::new(SimulatedTaskApi::new());
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();
        controller.submit().await.unwrap();

        assert!(matches!(
            controller.advance("nope", transcript("...")),
            Err(WorkflowError::UnknownStep(_))
        ));
        assert!(matches!(
            controller.advance(video_book::GENERATE_BOOK, transcript("...")),
            Err(WorkflowError::StepMismatch { .. })
        ));
        assert_eq!(controller.cursor(), 0);
    }

    #[tokio::test]
    async fn advance_before_task_succeeds_is_rejected() {
        let api = Arc::new(SimulatedTaskApi::new());
        let mut controller = controller(api.clone());
        controller.start(VideoBookInput::from_video("a")).unwrap();
        let submission = controller.submit().await.unwrap();

        let err = controller
            .advance(video_book::EXTRACT_TRANSCRIPT, transcript("fake"))
            .unwrap_err();

        assert_eq!(
            err,
            WorkflowError::InvalidState {
                step: video_book::EXTRACT_TRANSCRIPT.to_string(),
                state: "polling",
                action: "advance",
            }
        );
        assert_eq!(controller.cursor(), 0);
        assert!(controller.results().is_empty());
        assert_eq!(
            controller.current_state(),
            &StepState::Polling {
                task_id: submission.task_id.clone()
            }
        );
        assert_eq!(api.status_calls(&submission.task_id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_a_succeeded_step_reads_status_once() {
        let api = Arc::new(SimulatedTaskApi::new().script(
            EXTRACT,
            TaskScript::new()
                .running(1, 2)
                .success(json!({"transcript": "..."})),
        ));
        let mut controller = controller(api.clone());
        controller.start(VideoBookInput::from_video("a")).unwrap();
        let submission = controller.submit().await.unwrap();

        let first = controller.poll().await.unwrap();
        assert_eq!(api.status_calls(&submission.task_id), 2);
        assert_eq!(
            controller.current_state(),
            &StepState::Succeeded {
                task_id: submission.task_id.clone()
            }
        );

        let second = controller.poll().await.unwrap();
        assert_eq!(api.status_calls(&submission.task_id), 2);
        assert_eq!(second.task_id, first.task_id);
        assert_eq!(second.result, first.result);

        // A succeeded step has no task left to submit or cancel.
        assert!(matches!(
            controller.submit().await,
            Err(WorkflowError::InvalidState { state: "succeeded", .. })
        ));
        assert!(!controller.cancel().await.unwrap());
        assert_eq!(api.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_with_wrong_shape_is_a_projection_error() {
        let api = Arc::new(SimulatedTaskApi::new().script(
            EXTRACT,
            TaskScript::new().success(json!({"transcript": "..."})),
        ));
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();
        controller.submit().await.unwrap();
        controller.poll().await.unwrap();

        let err = controller
            .advance(
                video_book::EXTRACT_TRANSCRIPT,
                VideoBookOutput::Book {
                    title: "t".to_string(),
                    chapters: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Projection(_)));
        assert_eq!(controller.cursor(), 0);
        assert!(controller.results().is_empty());
        assert!(matches!(
            controller.current_state(),
            StepState::Succeeded { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_result_fails_step() {
        let api = Arc::new(SimulatedTaskApi::new().script(
            EXTRACT,
            TaskScript::new().success(json!({"text": "wrong field"})),
        ));
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();

        let err = controller.run_step().await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidResult { .. }));
        assert!(matches!(controller.current_state(), StepState::Failed { .. }));
        assert_eq!(controller.cursor(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_polling_fails_step() {
        let api = Arc::new(
            SimulatedTaskApi::new().script(EXTRACT, TaskScript::new().transport_error()),
        );
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();

        let err = controller.run_step().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Polling(PollingError::TransportExhausted { attempts: 2, .. })
        ));
        assert!(matches!(controller.current_state(), StepState::Failed { .. }));
    }

    #[tokio::test]
    async fn cancel_without_active_task_is_noop() {
        let api = Arc::new(SimulatedTaskApi::new());
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();
        assert!(!controller.cancel().await.unwrap());
    }

    #[tokio::test]
    async fn remote_cancel_notifies_service() {
        let api = Arc::new(SimulatedTaskApi::new());
        let mut controller = controller(api.clone()).with_remote_cancel(true);
        controller.start(VideoBookInput::from_video("a")).unwrap();
        let submission = controller.submit().await.unwrap();

        assert!(controller.cancel().await.unwrap());
        assert_eq!(controller.current_state(), &StepState::Idle);
        assert!(api.calls().contains(&ApiCall::Cancel {
            task_id: submission.task_id
        }));
        assert!(!controller.cancellation_token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_event_receiver_does_not_stop_the_step() {
        let api = Arc::new(SimulatedTaskApi::new().script(
            EXTRACT,
            TaskScript::new()
                .running(1, 2)
                .success(json!({"transcript": "..."})),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut controller = controller(api).with_events(tx);
        controller.start(VideoBookInput::from_video("a")).unwrap();

        controller.run_step().await.unwrap();
        assert_eq!(controller.cursor(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn step_history_records_each_transition() {
        let api = Arc::new(SimulatedTaskApi::new().script(
            EXTRACT,
            TaskScript::new().success(json!({"transcript": "..."})),
        ));
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();
        controller.run_step().await.unwrap();

        let labels: Vec<_> = controller
            .step_history(video_book::EXTRACT_TRANSCRIPT)
            .unwrap()
            .iter()
            .map(|transition| transition.to.label())
            .collect();
        assert_eq!(labels, ["submitting", "polling", "succeeded", "completed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_to_first_step() {
        let api = Arc::new(SimulatedTaskApi::new().script(
            EXTRACT,
            TaskScript::new().success(json!({"transcript": "..."})),
        ));
        let mut controller = controller(api);
        controller.start(VideoBookInput::from_video("a")).unwrap();
        controller.run_step().await.unwrap();
        assert_eq!(controller.cursor(), 1);

        controller.reset();
        assert_eq!(controller.cursor(), 0);
        assert!(controller.results().is_empty());
        assert_eq!(controller.current_input(), None);
        assert_eq!(
            controller.step_state(video_book::EXTRACT_TRANSCRIPT),
            Some(&StepState::Idle)
        );
    }
}
