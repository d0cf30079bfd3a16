use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::config::JobsConfig;
use crate::jobs::error::TaskResult;
use crate::jobs::registry::{TaskHandler, TaskRequest};

#[derive(Debug, Default, Deserialize)]
struct SleepPayload {
    ms: Option<u64>,
}

/// Range of the random sleep picked when the payload names none.
const DEFAULT_RANGE_MS: (u64, u64) = (10_000, 30_000);

/// Sleeps for `payload.ms`, or a random 10-30 s when unset, never past
/// `max_ms`.
#[derive(Debug, Clone)]
pub struct SleepTask {
    max_ms: u64,
}

impl Default for SleepTask {
    fn default() -> Self {
        Self::from_config(&JobsConfig::default())
    }
}

impl SleepTask {
    pub fn new(max_ms: u64) -> Self {
        Self { max_ms }
    }

    /// Capped below the worker lease so a sleeping job is never reclaimed.
    pub fn from_config(config: &JobsConfig) -> Self {
        Self::new(config.sleep_cap_ms())
    }

    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    /// Time this task would sleep for a payload asking for `requested`.
    pub fn duration_ms(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(ms) => ms.min(self.max_ms),
            None => {
                let (low, high) = DEFAULT_RANGE_MS;
                rand::rng().random_range(low.min(self.max_ms)..=high.min(self.max_ms))
            }
        }
    }
}

#[async_trait]
impl TaskHandler for SleepTask {
    fn task_type() -> &'static str {
        "sleep"
    }

    async fn execute(&self, request: TaskRequest) -> TaskResult<JsonValue> {
        let payload: SleepPayload = super::decode(request.payload)?;
        let ms = self.duration_ms(payload.ms);

        tracing::debug!(job_id = %request.job_id, ms, "Sleeping");
        tokio::time::sleep(Duration::from_millis(ms)).await;

        Ok(json!({ "sleptMs": ms }))
    }
}
