use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::jobs::error::TaskResult;
use crate::jobs::registry::{TaskHandler, TaskRequest};

#[derive(Debug, Deserialize)]
struct TransformPayload {
    data: Option<JsonValue>,
    #[serde(default)]
    uppercase: bool,
}

/// Echoes `payload.data` (or the whole payload), optionally upper-casing
/// every string value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformTask;

fn uppercase(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(s.to_uppercase()),
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(uppercase).collect()),
        JsonValue::Object(map) => {
            JsonValue::Object(map.into_iter().map(|(k, v)| (k, uppercase(v))).collect())
        }
        other => other,
    }
}

#[async_trait]
impl TaskHandler for TransformTask {
    fn task_type() -> &'static str {
        "transform"
    }

    async fn execute(&self, request: TaskRequest) -> TaskResult<JsonValue> {
        // Only objects carry options; anything else is echoed as-is.
        if !request.payload.is_object() {
            return Ok(request.payload);
        }

        let options: TransformPayload = super::decode(request.payload.clone())?;
        let data = options.data.unwrap_or(request.payload);

        Ok(if options.uppercase { uppercase(data) } else { data })
    }
}
