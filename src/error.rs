// ABOUTME: Domain error kinds raised by the copy phases
// ABOUTME: Carried inside anyhow errors and recovered with downcast_ref

use thiserror::Error;

/// Fatal conditions that abort a copy run.
///
/// Driver and I/O failures travel as plain `anyhow::Error` with context;
/// these variants mark the failures callers are expected to tell apart.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Endpoint unreachable or liveness probe failed at startup
    #[error("Failed to connect to database at {descriptor}:\n  {source}")]
    Connection {
        descriptor: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A value is longer than its column's declared bound
    #[error(
        "Detected data that exceeds the length limitation of its column.\n\
         \n  Table  : {table}\
         \n  Column : {column}\
         \n  Type   : {db_type}\
         \n  Data   : {value}"
    )]
    InvalidData {
        table: String,
        column: String,
        db_type: String,
        value: String,
    },

    /// DDL failed against the destination
    #[error("Failed to apply migration for table '{table}': {statement}\n  {source}")]
    MigrationApply {
        table: String,
        statement: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Destination contents do not line up with the source prefix being resumed
    #[error("Cannot resume table '{table}': {detail}. Re-run without --continue to copy it from scratch.")]
    ResumeMismatch { table: String, detail: String },
}

impl CopyError {
    pub fn connection(descriptor: impl Into<String>, cause: anyhow::Error) -> Self {
        CopyError::Connection {
            descriptor: descriptor.into(),
            source: cause.into(),
        }
    }

    pub fn migration_apply(
        table: impl Into<String>,
        statement: impl Into<String>,
        cause: anyhow::Error,
    ) -> Self {
        CopyError::MigrationApply {
            table: table.into(),
            statement: statement.into(),
            source: cause.into(),
        }
    }

    pub fn resume_mismatch(table: impl Into<String>, detail: impl Into<String>) -> Self {
        CopyError::ResumeMismatch {
            table: table.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_data_message_names_every_field() {
        let err = CopyError::InvalidData {
            table: "users".to_string(),
            column: "name".to_string(),
            db_type: "varchar(5)".to_string(),
            value: "Bartholomew".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Table  : users"));
        assert!(msg.contains("Column : name"));
        assert!(msg.contains("Type   : varchar(5)"));
        assert!(msg.contains("Data   : Bartholomew"));
    }

    #[test]
    fn test_connection_error_keeps_cause() {
        let err = CopyError::connection(
            "postgres://app:***@db:5432/shop",
            anyhow::anyhow!("Connection refused"),
        );
        let msg = err.to_string();
        assert!(msg.contains("postgres://app:***@db:5432/shop"));
        assert!(msg.contains("Connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = CopyError::resume_mismatch("orders", "key differs").into();
        let copy_err = err.downcast_ref::<CopyError>();
        assert!(matches!(copy_err, Some(CopyError::ResumeMismatch { .. })));
    }
}
