//! Audit trail written alongside every engine transition.
//!
//! The trail is best effort: a failing sink is reported through `tracing`
//! and never fails the transition it accompanies.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::AppResult;
use crate::jobs::clock::Clock;
use crate::models::{AuditEntry, AuditFilter, LogLevel, NewAuditEntry, OwnerType};

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> AppResult<()>;

    /// Newest first, by id.
    async fn recent(&self, filter: &AuditFilter, limit: i64) -> AppResult<Vec<AuditEntry>>;
}

/// Fire-and-forget writer over an [`AuditSink`].
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    /// Append `entry`, stamping `created_at` when unset.
    pub async fn record(&self, mut entry: NewAuditEntry) {
        if entry.created_at == 0 {
            entry.created_at = self.clock.now_ms();
        }
        let owner_type = entry.owner_type;
        let owner_id = entry.owner_id.clone().unwrap_or_default();

        if let Err(e) = self.sink.append(entry).await {
            tracing::warn!(
                error = %e,
                owner_type = %owner_type,
                owner_id = %owner_id,
                "Failed to persist audit entry"
            );
        }
    }

    pub async fn job(&self, job_id: Uuid, level: LogLevel, message: impl Into<String>) {
        self.record(NewAuditEntry::new(
            OwnerType::Job,
            Some(job_id.to_string()),
            level,
            message,
        ))
        .await;
    }

    pub async fn job_with_meta(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: impl Into<String>,
        meta: JsonValue,
    ) {
        self.record(
            NewAuditEntry::new(OwnerType::Job, Some(job_id.to_string()), level, message)
                .with_meta(meta),
        )
        .await;
    }

    pub async fn worker(&self, worker_id: &str, level: LogLevel, message: impl Into<String>) {
        self.record(NewAuditEntry::new(
            OwnerType::Worker,
            Some(worker_id.to_string()),
            level,
            message,
        ))
        .await;
    }

    pub async fn user(&self, user_id: &str, level: LogLevel, message: impl Into<String>) {
        self.record(NewAuditEntry::new(
            OwnerType::User,
            Some(user_id.to_string()),
            level,
            message,
        ))
        .await;
    }
}
