//! Task submission

use std::sync::Arc;

use log::{error, info};
use serde::Serialize;
use task_client::TaskApi;
use task_core::{Submission, SubmissionError};

/// Issues one unit of work to a named endpoint.
///
/// Exactly one request per call and no retries; guarding against duplicate
/// submissions is the caller's job.
#[derive(Clone)]
pub struct TaskSubmitter {
    api: Arc<dyn TaskApi>,
}

impl TaskSubmitter {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self { api }
    }

    pub async fn submit<P>(&self, endpoint: &str, payload: &P) -> Result<Submission, SubmissionError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(payload).map_err(|e| SubmissionError::Encode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        match self.api.submit(endpoint, &body).await {
            Ok(submission) => {
                info!("{} accepted as task {}", endpoint, submission.task_id);
                Ok(submission)
            }
            Err(e) => {
                error!("Submission to {} failed: {}", endpoint, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use task_client::{ApiCall, SimulatedTaskApi};

    #[tokio::test]
    async fn submits_serialized_payload_once() {
        let api = Arc::new(SimulatedTaskApi::new());
        let submitter = TaskSubmitter::new(api.clone());

        let submission = submitter
            .submit("/api/video/extract-transcript", &json!({"video_url": "https://x/y"}))
            .await
            .unwrap();

        assert!(!submission.task_id.is_empty());
        assert_eq!(
            api.calls(),
            vec![ApiCall::Submit {
                endpoint: "/api/video/extract-transcript".to_string(),
                payload: json!({"video_url": "https://x/y"}),
            }]
        );
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let api = Arc::new(SimulatedTaskApi::new().reject(
            "/api/video/extract-transcript",
            SubmissionError::MissingTaskId {
                endpoint: "/api/video/extract-transcript".to_string(),
            },
        ));
        let submitter = TaskSubmitter::new(api.clone());

        let result = submitter
            .submit("/api/video/extract-transcript", &json!({}))
            .await;
        assert!(result.is_err());
        assert_eq!(api.submit_calls(), 1);
    }
}
