//! Dashboard report DTO.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::StatusReport;

/// Job counts per lifecycle bucket; `total` is the sum of the six buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "submitted": 4,
    "processing": 1,
    "done": 20,
    "failed": 2,
    "dlqWithRedrive": 1,
    "dlqWithoutRedrive": 0,
    "total": 28
}))]
pub struct ReportResponse {
    pub submitted: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
    pub dlq_with_redrive: i64,
    pub dlq_without_redrive: i64,
    pub total: i64,
}

impl From<StatusReport> for ReportResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            submitted: report.submitted,
            processing: report.processing,
            done: report.done,
            failed: report.failed,
            dlq_with_redrive: report.dlq_with_redrive,
            dlq_without_redrive: report.dlq_without_redrive,
            total: report.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_matches_buckets() {
        let report = StatusReport {
            submitted: 1,
            processing: 2,
            done: 3,
            failed: 4,
            dlq_with_redrive: 5,
            dlq_without_redrive: 6,
        };
        let response = ReportResponse::from(report);
        assert_eq!(response.total, 21);

        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["dlqWithoutRedrive"], 6);
    }
}
