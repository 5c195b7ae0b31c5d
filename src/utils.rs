// ABOUTME: Utility functions for validation and reporting
// ABOUTME: Provides endpoint sanity checks, identifier sanitizing, and duration formatting

use crate::config::EndpointConfig;
use crate::drivers::Dialect;
use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;

/// Sanitize an identifier (table name, column name, etc.) for display
///
/// Removes control characters and limits length to prevent log injection
/// and keep error messages readable.
///
/// **Note**: This is for display purposes only. SQL text quotes identifiers
/// through [`Dialect::quote_ident`].
///
/// # Examples
///
/// ```
/// # use db_copier::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\x00name"), "tablename");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
///
/// let long_name = "a".repeat(200);
/// assert_eq!(sanitize_identifier(&long_name).len(), 100);
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Validate that source and destination are different databases
///
/// The schema phase drops and recreates every copied table on the
/// destination, so pointing both endpoints at the same database would
/// destroy the source data.
///
/// Endpoints are compared on adapter, host (case-insensitive), port (with
/// dialect defaults), database name, and PostgreSQL schema. SQLite files are
/// compared by canonical path when both exist.
///
/// # Errors
///
/// Returns an error if both descriptors resolve to the same database.
///
/// # Examples
///
/// ```
/// # use db_copier::config::EndpointConfig;
/// # use db_copier::drivers::Dialect;
/// # use db_copier::utils::validate_source_target_different;
/// let pg = EndpointConfig::new(Dialect::Postgres, "shop").normalized();
/// let mysql = EndpointConfig::new(Dialect::Mysql, "shop");
/// assert!(validate_source_target_different(&pg, &mysql).is_ok());
/// assert!(validate_source_target_different(&pg, &pg.clone()).is_err());
/// ```
pub fn validate_source_target_different(
    source: &EndpointConfig,
    target: &EndpointConfig,
) -> Result<()> {
    if source.adapter != target.adapter {
        return Ok(());
    }

    let same = match source.adapter {
        Dialect::Sqlite => same_file(&source.database, &target.database),
        Dialect::Postgres | Dialect::Mysql => {
            let source = source.clone().normalized();
            let target = target.clone().normalized();
            source.host_or_default().eq_ignore_ascii_case(target.host_or_default())
                && source.port_or_default() == target.port_or_default()
                && source.database == target.database
                && source.schema == target.schema
        }
    };

    if same {
        bail!(
            "Source and destination point to the same database!\n\
             \n\
             This would cause DATA LOSS - the schema phase drops destination tables.\n\
             \n\
             Source:      {}\n\
             Destination: {}\n\
             \n\
             Please ensure source and destination are different databases.",
            source,
            target
        );
    }

    Ok(())
}

fn same_file(a: &str, b: &str) -> bool {
    match (Path::new(a).canonicalize(), Path::new(b).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Format elapsed wall time as whole minutes plus fractional seconds
///
/// # Examples
///
/// ```
/// # use db_copier::utils::format_elapsed;
/// # use std::time::Duration;
/// assert_eq!(format_elapsed(Duration::from_millis(125_500)), "2 minutes, 5.50 seconds");
/// assert_eq!(format_elapsed(Duration::from_secs(3)), "0 minutes, 3.00 seconds");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs_f64();
    let minutes = (total / 60.0).floor();
    let seconds = total - minutes * 60.0;
    format!("{} minutes, {:.2} seconds", minutes as u64, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg(host: &str, port: Option<u16>, db: &str) -> EndpointConfig {
        let mut e = EndpointConfig::new(Dialect::Postgres, db);
        e.host = Some(host.to_string());
        e.port = port;
        e
    }

    #[test]
    fn test_different_hosts_are_allowed() {
        assert!(validate_source_target_different(
            &pg("source.com", None, "db"),
            &pg("target.com", None, "db")
        )
        .is_ok());
    }

    #[test]
    fn test_same_database_is_rejected() {
        let result =
            validate_source_target_different(&pg("HOST", None, "db"), &pg("host", Some(5432), "db"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("same database"));
    }

    #[test]
    fn test_different_schema_is_allowed() {
        let source = pg("host", None, "db");
        let mut target = pg("host", None, "db");
        target.schema = Some("archive".to_string());
        assert!(validate_source_target_different(&source, &target).is_ok());
    }

    #[test]
    fn test_sqlite_same_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        std::fs::File::create(&path).unwrap();

        let direct = EndpointConfig::new(Dialect::Sqlite, path.to_str().unwrap());
        let indirect = EndpointConfig::new(
            Dialect::Sqlite,
            dir.path().join(".").join("app.db").to_str().unwrap(),
        );
        assert!(validate_source_target_different(&direct, &indirect).is_err());
    }

    #[test]
    fn test_format_elapsed_under_a_minute() {
        assert_eq!(
            format_elapsed(Duration::from_millis(59_250)),
            "0 minutes, 59.25 seconds"
        );
    }
}
