//! Read access to the audit trail.

use std::sync::Arc;

use crate::error::AppResult;
use crate::jobs::AuditSink;
use crate::models::{AuditEntry, AuditFilter};

#[derive(Debug, Clone, PartialEq)]
pub struct LogPage {
    pub logs: Vec<AuditEntry>,
    /// Exclusive id cursor for the next page
    pub next_cursor: Option<i64>,
}

#[derive(Clone)]
pub struct LogService {
    sink: Arc<dyn AuditSink>,
}

impl LogService {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn list(&self, filter: AuditFilter, limit: i64) -> AppResult<LogPage> {
        let limit = limit.max(1);
        let mut logs = self.sink.recent(&filter, limit + 1).await?;

        let next_cursor = if logs.len() as i64 > limit {
            logs.truncate(limit as usize);
            logs.last().map(|entry| entry.id)
        } else {
            None
        };

        Ok(LogPage { logs, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryAuditSink;
    use crate::models::{LogLevel, NewAuditEntry, OwnerType};

    #[tokio::test]
    async fn test_pages_through_entries() {
        let sink = Arc::new(InMemoryAuditSink::new());
        for i in 0..5 {
            sink.append(NewAuditEntry::new(
                OwnerType::System,
                None,
                LogLevel::Info,
                format!("entry {i}"),
            ))
            .await
            .unwrap();
        }
        let service = LogService::new(sink);

        let first = service.list(AuditFilter::default(), 2).await.unwrap();
        assert_eq!(first.logs.iter().map(|e| e.id).collect::<Vec<_>>(), vec![5, 4]);
        assert_eq!(first.next_cursor, Some(4));

        let rest = service
            .list(
                AuditFilter {
                    before: first.next_cursor,
                    ..Default::default()
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(rest.logs.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 2, 1]);
        assert!(rest.next_cursor.is_none());
    }
}
