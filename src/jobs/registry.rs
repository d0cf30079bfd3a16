use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::jobs::error::TaskResult;

/// Everything a handler learns about the job it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub job_id: Uuid,
    pub owner_id: String,
    pub task_type: String,
    /// Decoded payload, or the raw text as a JSON string when it does not parse
    pub payload: JsonValue,
    pub worker_id: String,
}

/// Trait that all task handlers must implement
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Task type this handler serves by default
    fn task_type() -> &'static str
    where
        Self: Sized;

    /// Execute the task
    async fn execute(&self, request: TaskRequest) -> TaskResult<JsonValue>;
}

/// Registry for mapping task types to handlers
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own task type
    pub fn register<T>(&mut self, handler: T) -> &mut Self
    where
        T: TaskHandler + 'static,
    {
        self.register_as(T::task_type(), Arc::new(handler))
    }

    /// Register a handler under an explicit task type
    pub fn register_as(
        &mut self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> &mut Self {
        self.handlers.insert(task_type.into(), handler);
        self
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    pub fn task_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Fail if any declared task type has no handler.
    pub fn validate(&self, declared: &[String]) -> AppResult<()> {
        let missing: Vec<&str> = declared
            .iter()
            .map(String::as_str)
            .filter(|t| !self.contains(t))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Configuration {
                key: "jobs.task_types".to_string(),
                source: anyhow::anyhow!("No handler registered for: {}", missing.join(", ")),
            })
        }
    }
}
