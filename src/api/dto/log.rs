//! Audit log DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::jobs::clock::iso8601;
use crate::models::{AuditEntry, AuditFilter, LogLevel, OwnerType};
use crate::services::LogPage;

/// Query parameters for audit log listings.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LogListQuery {
    pub owner_type: Option<OwnerType>,

    pub owner_id: Option<String>,

    pub level: Option<LogLevel>,

    /// Only entries with an id below this one
    pub before: Option<i64>,

    #[serde(default = "default_log_limit")]
    #[validate(range(min = 1, max = 200, message = "limit must be between 1 and 200"))]
    #[param(minimum = 1, maximum = 200, example = 50)]
    pub limit: i64,
}

fn default_log_limit() -> i64 {
    50
}

impl LogListQuery {
    pub fn into_filter(self) -> (AuditFilter, i64) {
        let filter = AuditFilter {
            owner_type: self.owner_type,
            owner_id: self.owner_id,
            level: self.level,
            before: self.before,
        };
        (filter, self.limit)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: i64,
    pub owner_type: OwnerType,
    pub owner_id: Option<String>,
    pub level: LogLevel,
    #[schema(example = "handler processed successfully")]
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub meta: Option<JsonValue>,
    pub created_at: i64,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at_iso: Option<String>,
}

impl From<AuditEntry> for LogResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            owner_type: entry.owner_type,
            owner_id: entry.owner_id,
            level: entry.level,
            message: entry.message,
            meta: entry.meta,
            created_at_iso: iso8601(entry.created_at),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogListResponse {
    pub logs: Vec<LogResponse>,
    /// Pass back as `before` to fetch older entries
    pub next_cursor: Option<i64>,
}

impl From<LogPage> for LogListResponse {
    fn from(page: LogPage) -> Self {
        Self {
            logs: page.logs.into_iter().map(LogResponse::from).collect(),
            next_cursor: page.next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_and_filter() {
        let query: LogListQuery =
            serde_json::from_str(r#"{"ownerType":"job","level":"error","before":12}"#).unwrap();
        assert_eq!(query.limit, 50);

        let (filter, limit) = query.into_filter();
        assert_eq!(limit, 50);
        assert_eq!(filter.owner_type, Some(OwnerType::Job));
        assert_eq!(filter.level, Some(LogLevel::Error));
        assert_eq!(filter.before, Some(12));
    }

    #[test]
    fn test_query_limit_upper_bound() {
        let query: LogListQuery = serde_json::from_str(r#"{"limit": 201}"#).unwrap();
        assert!(query.validate().is_err());
    }
}
