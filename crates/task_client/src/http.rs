use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{Client, Method, Proxy, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;
use task_core::{
    StatusResponse, Submission, SubmissionError, TaskSnapshot, TaskflowConfig, TransportError,
};

use crate::api::TaskApi;

const STATUS_PATH: &str = "/api/tasks/status";
const CANCEL_PATH: &str = "/api/tasks/cancel";

/// reqwest-backed client for the task service.
///
/// Submissions go through a client without retry middleware because they are
/// not idempotent. Status reads and cancellations may be retried on transient
/// errors when `status_retries` is non-zero.
#[derive(Debug, Clone)]
pub struct HttpTaskClient {
    base_url: String,
    api_key: Option<String>,
    submit_client: Arc<ClientWithMiddleware>,
    read_client: Arc<ClientWithMiddleware>,
}

impl HttpTaskClient {
    pub fn new(config: &TaskflowConfig) -> anyhow::Result<Self> {
        let client = Self::build_http_client(config)?;
        let submit_client = ClientBuilder::new(client.clone()).build();
        let read_client = Self::build_retry_client(client, config.status_retries);

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            submit_client: Arc::new(submit_client),
            read_client: Arc::new(read_client),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_http_client(config: &TaskflowConfig) -> anyhow::Result<Client> {
        let mut builder = Client::builder().timeout(config.request_timeout());
        if !config.http_proxy.is_empty() {
            builder = builder.proxy(Proxy::http(&config.http_proxy)?);
        }
        if !config.https_proxy.is_empty() {
            builder = builder.proxy(Proxy::https(&config.https_proxy)?);
        }
        builder
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))
    }

    fn build_retry_client(client: Client, max_retries: u32) -> ClientWithMiddleware {
        if max_retries == 0 {
            return ClientBuilder::new(client).build();
        }
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(
                std::time::Duration::from_millis(200),
                std::time::Duration::from_secs(5),
            )
            .build_with_max_retries(max_retries);

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn send(
        &self,
        client: &ClientWithMiddleware,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, TransportError> {
        let mut builder = self.authorize(client.request(method.clone(), url));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!("Sending {} request to {}", method, url);
        let start_time = Instant::now();

        let response = builder.send().await.map_err(|e| {
            if let reqwest_middleware::Error::Reqwest(inner) = &e {
                if inner.is_timeout() {
                    error!("Request to {} timed out", url);
                } else if inner.is_connect() {
                    error!("Connection error for {}", url);
                }
            }
            error!("Failed HTTP request to {}: {}", url, e);
            TransportError::Request {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        debug!(
            "Got response from {} after {:?} with status {}",
            url,
            start_time.elapsed(),
            response.status()
        );

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned HTTP {}", url, status);
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        url: &str,
        response: Response,
    ) -> Result<T, TransportError> {
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl TaskApi for HttpTaskClient {
    async fn submit(&self, endpoint: &str, payload: &Value) -> Result<Submission, SubmissionError> {
        let url = self.url(endpoint);
        let response = self
            .send(&self.submit_client, Method::POST, &url, Some(payload))
            .await?;
        let body: Value = Self::read_json(&url, response).await?;

        let submission =
            Submission::from_body(body).ok_or_else(|| SubmissionError::MissingTaskId {
                endpoint: endpoint.to_string(),
            })?;
        info!("Submitted {} as task {}", endpoint, submission.task_id);
        Ok(submission)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskSnapshot, TransportError> {
        let url = self.url(&format!("{}/{}", STATUS_PATH, task_id));
        let response = self.send(&self.read_client, Method::GET, &url, None).await?;
        let status: StatusResponse = Self::read_json(&url, response).await?;
        Ok(TaskSnapshot::from_response(task_id, status))
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), TransportError> {
        let url = self.url(&format!("{}/{}", CANCEL_PATH, task_id));
        self.send(&self.read_client, Method::DELETE, &url, None)
            .await?;
        info!("Cancelled task {}", task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_base(base: &str) -> HttpTaskClient {
        let config = TaskflowConfig {
            api_base: base.to_string(),
            ..TaskflowConfig::default()
        };
        HttpTaskClient::new(&config).expect("client")
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = client_with_base("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.url("/api/video/extract-transcript"),
            "http://localhost:8000/api/video/extract-transcript"
        );
        assert_eq!(
            client.url("api/shahid/build-scenes"),
            "http://localhost:8000/api/shahid/build-scenes"
        );
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let config = TaskflowConfig {
            api_key: Some(String::new()),
            ..TaskflowConfig::default()
        };
        let client = HttpTaskClient::new(&config).expect("client");
        assert!(client.api_key.is_none());
    }
}
