//! Audit log entries persisted in the `logs` table.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::logs;

// ============================================================================
// Enums
// ============================================================================

/// Kind of entity an audit entry is about
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Job,
    Worker,
    User,
    System,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Job => "job",
            OwnerType::Worker => "worker",
            OwnerType::User => "user",
            OwnerType::System => "system",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(OwnerType::Job),
            "worker" => Ok(OwnerType::Worker),
            "user" => Ok(OwnerType::User),
            "system" => Ok(OwnerType::System),
            other => Err(format!("Unrecognized owner_type: {}", other)),
        }
    }
}

impl diesel::query_builder::QueryId for OwnerType {
    type QueryId = OwnerType;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for OwnerType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for OwnerType {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        s.parse::<OwnerType>().map_err(Into::into)
    }
}

/// Severity of an audit entry
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("Unrecognized log level: {}", other)),
        }
    }
}

impl diesel::query_builder::QueryId for LogLevel {
    type QueryId = LogLevel;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for LogLevel {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for LogLevel {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        s.parse::<LogLevel>().map_err(Into::into)
    }
}

// ============================================================================
// Entry Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditEntry {
    pub id: i64,
    pub owner_type: OwnerType,
    pub owner_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub meta: Option<JsonValue>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = logs)]
pub struct NewAuditEntry {
    pub owner_type: OwnerType,
    pub owner_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub meta: Option<JsonValue>,
    pub created_at: i64,
}

impl NewAuditEntry {
    pub fn new(
        owner_type: OwnerType,
        owner_id: Option<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner_type,
            owner_id,
            level,
            message: message.into(),
            meta: None,
            created_at: 0,
        }
    }

    pub fn with_meta(mut self, meta: JsonValue) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Filter for audit listings; `before` is an exclusive id cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub owner_type: Option<OwnerType>,
    pub owner_id: Option<String>,
    pub level: Option<LogLevel>,
    pub before: Option<i64>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.owner_type.is_none_or(|t| entry.owner_type == t)
            && self
                .owner_id
                .as_ref()
                .is_none_or(|id| entry.owner_id.as_ref() == Some(id))
            && self.level.is_none_or(|l| entry.level == l)
            && self.before.is_none_or(|b| entry.id < b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, owner_type: OwnerType, owner_id: &str, level: LogLevel) -> AuditEntry {
        AuditEntry {
            id,
            owner_type,
            owner_id: Some(owner_id.to_string()),
            level,
            message: "m".to_string(),
            meta: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_enum_strings_parse_back() {
        for t in [OwnerType::Job, OwnerType::Worker, OwnerType::User, OwnerType::System] {
            assert_eq!(t.as_str().parse::<OwnerType>(), Ok(t));
        }
        for l in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            assert_eq!(l.to_string().parse::<LogLevel>(), Ok(l));
        }
    }

    #[test]
    fn test_filter_matches_every_field() {
        let e = entry(10, OwnerType::Job, "abc", LogLevel::Error);
        assert!(AuditFilter::default().matches(&e));
        assert!(AuditFilter {
            owner_type: Some(OwnerType::Job),
            owner_id: Some("abc".to_string()),
            level: Some(LogLevel::Error),
            before: Some(11),
        }
        .matches(&e));
        assert!(!AuditFilter {
            before: Some(10),
            ..Default::default()
        }
        .matches(&e));
        assert!(!AuditFilter {
            owner_type: Some(OwnerType::Worker),
            ..Default::default()
        }
        .matches(&e));
    }
}
