use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::error::{AppError, AppResult};
use crate::jobs::error::{TaskError, TaskResult};
use crate::jobs::registry::{TaskHandler, TaskRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    url: Option<String>,
    #[serde(default)]
    body: JsonValue,
}

/// POSTs `payload.body` to `payload.url`; a non-2xx response is a failure.
#[derive(Debug, Clone)]
pub struct WebhookTask {
    client: reqwest::Client,
}

impl WebhookTask {
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("conveyor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;
        Ok(Self { client })
    }

    fn parse_url(raw: Option<String>) -> TaskResult<Url> {
        let raw = raw.ok_or_else(|| TaskError::invalid_payload("`url` is required"))?;
        let url = Url::parse(&raw)
            .map_err(|e| TaskError::invalid_payload(format!("invalid url {:?}: {}", raw, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(TaskError::invalid_payload(format!(
                "unsupported url scheme: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl TaskHandler for WebhookTask {
    fn task_type() -> &'static str {
        "webhook"
    }

    async fn execute(&self, request: TaskRequest) -> TaskResult<JsonValue> {
        let payload: WebhookPayload = super::decode(request.payload)?;
        let url = Self::parse_url(payload.url)?;

        let response = self
            .client
            .post(url.clone())
            .header("x-conveyor-job-id", request.job_id.to_string())
            .json(&payload.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TaskError::Timeout(REQUEST_TIMEOUT.as_millis() as u64)
                } else {
                    TaskError::failed(format!("webhook request failed: {}", e))
                }
            })?;

        let status = response.status();
        tracing::info!(job_id = %request.job_id, url = %url, status = status.as_u16(), "Webhook delivered");

        if !status.is_success() {
            return Err(TaskError::failed(format!(
                "webhook responded with {}",
                status
            )));
        }

        Ok(json!({ "status": status.as_u16() }))
    }
}
