// ABOUTME: Index phase: rebuilds secondary indexes once data is loaded
// ABOUTME: Skips indexes the destination already has so reruns stay idempotent

use super::endpoint::Endpoint;
use super::script::{apply_script, MigrationScript};
use crate::drivers::Dialect;
use crate::progress::ProgressSink;
use crate::schema::IndexInfo;
use anyhow::Result;

/// Name `index` of `table` gets on the destination.
///
/// Names that are per-table on the source are prefixed with the table so
/// two tables' `email` indexes do not collide in a schema-wide namespace.
pub fn destination_index_name(
    source: Dialect,
    destination: Dialect,
    table: &str,
    index: &str,
) -> String {
    let needs_prefix = source.scopes_index_names_per_table()
        && !destination.scopes_index_names_per_table()
        && !index.starts_with(&format!("{}_", table));
    if needs_prefix {
        format!("{}_{}", table, index)
    } else {
        index.to_string()
    }
}

/// Create every source index missing on the destination.
///
/// Returns the number of indexes created.
pub async fn copy_indices(
    source: &mut Endpoint,
    destination: &mut Endpoint,
    tables: &[String],
    progress: &mut dyn ProgressSink,
) -> Result<usize> {
    let source_dialect = source.dialect();
    let dialect = destination.dialect();
    let mut created = 0;
    progress.start("indices", tables.len() as u64);

    for table in tables {
        let wanted = source.driver().table_indexes(table).await?;
        let existing: Vec<String> = destination
            .driver()
            .table_indexes(table)
            .await?
            .into_iter()
            .map(|index| index.name)
            .collect();

        let missing: Vec<IndexInfo> = wanted
            .into_iter()
            .map(|index| {
                let name = destination_index_name(source_dialect, dialect, table, &index.name);
                IndexInfo { name, ..index }
            })
            .filter(|index| {
                let present = existing.contains(&index.name);
                if present {
                    tracing::debug!("Index '{}' already exists on '{}'", index.name, table);
                }
                !present
            })
            .collect();

        let script = MigrationScript::create_indexes(dialect, table, &missing);
        if !script.is_empty() {
            apply_script(destination.driver(), &script).await?;
            created += missing.len();
        }
        progress.advance(1);
    }

    progress.finish();
    tracing::info!("  ✓ Created {} index(es)", created);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_index_names_are_prefixed_for_schema_wide_destinations() {
        assert_eq!(
            destination_index_name(Dialect::Mysql, Dialect::Postgres, "users", "email"),
            "users_email"
        );
        assert_eq!(
            destination_index_name(Dialect::Mysql, Dialect::Sqlite, "accounts", "email"),
            "accounts_email"
        );
    }

    #[test]
    fn test_index_names_kept_when_already_unique() {
        assert_eq!(
            destination_index_name(Dialect::Mysql, Dialect::Postgres, "users", "users_email_idx"),
            "users_email_idx"
        );
        assert_eq!(
            destination_index_name(Dialect::Mysql, Dialect::Mysql, "users", "email"),
            "email"
        );
        assert_eq!(
            destination_index_name(Dialect::Postgres, Dialect::Sqlite, "users", "email"),
            "email"
        );
    }
}
