//! Audit log repository for async database operations.
//!
//! Provides append and newest-first listing over the `logs` table.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::jobs::audit::AuditSink;
use crate::models::{AuditEntry, AuditFilter, NewAuditEntry};
use crate::schema::logs;

#[derive(Clone)]
pub struct AuditRepository {
    pool: AsyncDbPool,
}

impl AuditRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for AuditRepository {
    async fn append(&self, entry: NewAuditEntry) -> AppResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(logs::table)
            .values(&entry)
            .execute(&mut conn)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn recent(&self, filter: &AuditFilter, limit: i64) -> AppResult<Vec<AuditEntry>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let mut query = logs::table.select(AuditEntry::as_select()).into_boxed();

        if let Some(owner_type) = filter.owner_type {
            query = query.filter(logs::owner_type.eq(owner_type));
        }
        if let Some(owner_id) = &filter.owner_id {
            query = query.filter(logs::owner_id.eq(owner_id.clone()));
        }
        if let Some(level) = filter.level {
            query = query.filter(logs::level.eq(level));
        }
        if let Some(before) = filter.before {
            query = query.filter(logs::id.lt(before));
        }

        query
            .order(logs::id.desc())
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }
}
