//! Built-in task handlers.

mod send_email;
mod sleep;
mod transform;
mod webhook;

pub use failure_test::FailureTestTask;
pub use send_email::SendEmailTask;
pub use sleep::SleepTask;
pub use transform::TransformTask;
pub use webhook::WebhookTask;

use serde_json::Value as JsonValue;

use crate::config::JobsConfig;
use crate::error::AppResult;
use crate::jobs::error::{TaskError, TaskResult};
use crate::jobs::registry::HandlerRegistry;

/// Task types accepted out of the box, in registration order.
pub const BUILTIN_TASK_TYPES: &[&str] = &["sleep", "sendEmail", "webhook", "transform", "failureTest"];

/// Registry with every built-in handler, sized to the worker's lease.
pub fn builtin_registry(config: &JobsConfig) -> AppResult<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry
        .register(SleepTask::from_config(config))
        .register(SendEmailTask)
        .register(WebhookTask::new()?)
        .register(TransformTask)
        .register(FailureTestTask);
    Ok(registry)
}

/// Decode a handler payload; a raw string payload is an error here since
/// every built-in expects an object.
fn decode<T: serde::de::DeserializeOwned>(payload: JsonValue) -> TaskResult<T> {
    match payload {
        JsonValue::String(raw) => Err(TaskError::invalid_payload(format!(
            "expected a JSON object, got {:?}",
            raw
        ))),
        JsonValue::Null => Ok(serde_json::from_value(JsonValue::Object(Default::default()))?),
        other => Ok(serde_json::from_value(other)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_covers_default_types() {
        let registry = builtin_registry(&JobsConfig::default()).unwrap();
        let declared: Vec<String> = BUILTIN_TASK_TYPES.iter().map(|t| t.to_string()).collect();
        assert!(registry.validate(&declared).is_ok());
    }
}
