//! Task status polling
//!
//! The poller waits one interval, reads the status, hands the snapshot to
//! the observer and repeats until the task is terminal. Each read is awaited
//! before the next wait starts, so reads for a task never overlap.

use std::sync::Arc;

use log::{debug, info, warn};
use task_client::TaskApi;
use task_core::{PollConfig, PollingError, TaskSnapshot};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct TaskPoller {
    api: Arc<dyn TaskApi>,
    config: PollConfig,
}

impl TaskPoller {
    pub fn new(api: Arc<dyn TaskApi>, config: PollConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls `task_id` until it reaches `success` or `failure`.
    ///
    /// Returns the terminal snapshot. Transport failures are tolerated up to
    /// `max_consecutive_failures` in a row, with the wait doubling after each
    /// one. Once `cancel` fires no further read is issued and `on_snapshot`
    /// is not called again.
    pub async fn poll<F>(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
        mut on_snapshot: F,
    ) -> Result<TaskSnapshot, PollingError>
    where
        F: FnMut(&TaskSnapshot) + Send,
    {
        let budget = self.config.max_consecutive_failures.max(1);
        let mut failures = 0u32;

        loop {
            let delay = self.config.delay_after(failures);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(task_id)),
                _ = tokio::time::sleep(delay) => {}
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(task_id)),
                read = self.api.task_status(task_id) => read,
            };

            match read {
                Ok(snapshot) => {
                    if cancel.is_cancelled() {
                        return Err(cancelled(task_id));
                    }
                    failures = 0;
                    debug!(
                        "[{}] status {} ({}/{})",
                        task_id,
                        snapshot.status,
                        snapshot.progress.current(),
                        snapshot.progress.total()
                    );
                    on_snapshot(&snapshot);
                    if snapshot.is_terminal() {
                        info!("[{}] reached terminal status {}", task_id, snapshot.status);
                        return Ok(snapshot);
                    }
                }
                Err(error) => {
                    failures += 1;
                    warn!(
                        "[{}] status read failed ({}/{}): {}",
                        task_id, failures, budget, error
                    );
                    if failures >= budget {
                        return Err(PollingError::TransportExhausted {
                            task_id: task_id.to_string(),
                            attempts: failures,
                            last_error: error,
                        });
                    }
                }
            }
        }
    }
}

fn cancelled(task_id: &str) -> PollingError {
    info!("[{}] polling cancelled", task_id);
    PollingError::Cancelled {
        task_id: task_id.to_string(),
    }
}
