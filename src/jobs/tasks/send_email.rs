use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::jobs::error::{TaskError, TaskResult};
use crate::jobs::registry::{TaskHandler, TaskRequest};

#[derive(Debug, Deserialize)]
struct EmailPayload {
    to: Option<String>,
    subject: Option<String>,
}

/// Simulated email delivery. Requires a recipient.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendEmailTask;

#[async_trait]
impl TaskHandler for SendEmailTask {
    fn task_type() -> &'static str {
        "sendEmail"
    }

    async fn execute(&self, request: TaskRequest) -> TaskResult<JsonValue> {
        let payload: EmailPayload = super::decode(request.payload)?;
        let to = payload
            .to
            .filter(|to| to.contains('@'))
            .ok_or_else(|| TaskError::invalid_payload("`to` must be an email address"))?;

        tracing::info!(
            job_id = %request.job_id,
            owner_id = %request.owner_id,
            to = %to,
            "Email delivered"
        );

        Ok(json!({ "delivered": true, "to": to, "subject": payload.subject }))
    }
}
