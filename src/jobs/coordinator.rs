//! Coordinator sweep: the maintenance passes that keep jobs moving.
//!
//! Each pass is one conditional batch write and is safe to repeat every tick.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::error::AppResult;
use crate::jobs::audit::AuditLog;
use crate::jobs::clock::Clock;
use crate::jobs::store::JobStore;
use crate::models::{LogLevel, NewAuditEntry, OwnerType};

/// Owner id used for the coordinator's own audit entries.
pub const COORDINATOR_ID: &str = "coordinator";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reclaimed: usize,
    pub dead_lettered: usize,
    pub reactivated: usize,
    pub redriven: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.reclaimed + self.dead_lettered + self.reactivated + self.redriven
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub sweep_interval: Duration,
    pub error_backoff: Duration,
    pub redrive_batch_size: i64,
}

impl From<&CoordinatorConfig> for CoordinatorOptions {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            sweep_interval: config.sweep_interval(),
            error_backoff: config.error_backoff(),
            redrive_batch_size: i64::from(config.redrive_batch_size),
        }
    }
}

pub struct Coordinator {
    options: CoordinatorOptions,
    store: Arc<dyn JobStore>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
}

impl Coordinator {
    pub fn new(
        options: CoordinatorOptions,
        store: Arc<dyn JobStore>,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            options,
            store,
            audit,
            clock,
        }
    }

    /// Run all four passes once.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let now = self.clock.now_ms();
        let mut report = SweepReport::default();

        let reclaimed = self.store.reclaim_expired(now).await?;
        join_all(reclaimed.iter().map(|id| {
            self.audit
                .job(*id, LogLevel::Warn, "lease expired; reclaimed by coordinator")
        }))
        .await;
        report.reclaimed = reclaimed.len();

        let promoted = self.store.promote_exhausted(now).await?;
        join_all(
            promoted
                .iter()
                .map(|id| self.audit.job(*id, LogLevel::Error, "moved to dlq by coordinator")),
        )
        .await;
        report.dead_lettered = promoted.len();

        let reactivated = self.store.reactivate_due(now).await?;
        join_all(reactivated.iter().map(|id| {
            self.audit
                .job(*id, LogLevel::Info, "re-enabled for retry by coordinator")
        }))
        .await;
        report.reactivated = reactivated.len();

        let redriven = self
            .store
            .redrive_dead_letters(self.options.redrive_batch_size)
            .await?;
        join_all(redriven.iter().map(|job| {
            self.audit.job_with_meta(
                job.id,
                LogLevel::Info,
                "requeued from dlq by coordinator",
                json!({ "requeuedAt": now, "dlqRedrives": job.dlq_redrives }),
            )
        }))
        .await;
        report.redriven = redriven.len();

        if !report.is_empty() {
            tracing::info!(
                reclaimed = report.reclaimed,
                dead_lettered = report.dead_lettered,
                reactivated = report.reactivated,
                redriven = report.redriven,
                "Coordinator sweep"
            );
            self.audit
                .record(NewAuditEntry::new(
                    OwnerType::Worker,
                    Some(COORDINATOR_ID.to_string()),
                    LogLevel::Info,
                    format!(
                        "Coordinator sweep: reclaimed={}, dlq={}, reenabled={}, requeued={}",
                        report.reclaimed, report.dead_lettered, report.reactivated, report.redriven
                    ),
                ))
                .await;
        } else {
            tracing::debug!("Coordinator sweep found nothing to do");
        }

        Ok(report)
    }

    /// Sweep every `sweep_interval` until `shutdown` is cancelled. A failed
    /// sweep is logged and retried after `error_backoff`.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            sweep_ms = self.options.sweep_interval.as_millis() as u64,
            redrive_batch = self.options.redrive_batch_size,
            "Coordinator started"
        );
        self.audit
            .worker(COORDINATOR_ID, LogLevel::Info, "Coordinator started")
            .await;

        while !shutdown.is_cancelled() {
            let pause = match self.sweep().await {
                Ok(_) => self.options.sweep_interval,
                Err(e) => {
                    tracing::error!(error = %e, "Coordinator sweep failed");
                    self.options.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Coordinator stopped");
        self.audit
            .worker(COORDINATOR_ID, LogLevel::Info, "Coordinator stopped")
            .await;
    }
}
