use crate::error::AppError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Utility for converting database errors to structured AppError variants.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// # Arguments
    /// * `error` - The Diesel error to convert
    /// * `operation` - Description of the database operation that failed
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.as_ref(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        info: &(dyn diesel::result::DatabaseErrorInformation + Send + Sync),
        operation: &str,
    ) -> AppError {
        let message = info.message();
        let table = info.table_name().unwrap_or("resource").to_string();
        let column = info
            .column_name()
            .or(info.constraint_name())
            .unwrap_or("unknown")
            .to_string();

        match kind {
            DatabaseErrorKind::UniqueViolation => AppError::Duplicate {
                entity: table,
                field: column,
                value: info.details().unwrap_or(message).to_string(),
            },
            DatabaseErrorKind::NotNullViolation => AppError::Validation {
                field: column,
                reason: format!("Field is required for {}", table),
            },
            DatabaseErrorKind::CheckViolation => AppError::Validation {
                field: column,
                reason: format!("Check constraint failed for {}", table),
            },
            DatabaseErrorKind::ForeignKeyViolation => AppError::Validation {
                field: column,
                reason: format!("Invalid reference from {}", table),
            },
            _ => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::msg(format!("Database error: {}", message)),
            },
        }
    }
}
