// ABOUTME: Reversible DDL scripts as plain data plus the applier that runs them
// ABOUTME: Scripts are applied backward first, then forward, against the destination

use crate::drivers::{Dialect, Driver};
use crate::error::CopyError;
use crate::schema::{IndexInfo, TableSchema};
use anyhow::Result;

/// DDL for one table: `backward` undoes a previous application, `forward`
/// builds the target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub table: String,
    pub forward: Vec<String>,
    pub backward: Vec<String>,
}

impl MigrationScript {
    /// Drop-if-exists then create, rendered for `dialect`.
    ///
    /// `indexes` are built later but shape the column types.
    pub fn create_table(dialect: Dialect, table: &TableSchema, indexes: &[IndexInfo]) -> Self {
        Self {
            table: table.name.clone(),
            forward: vec![dialect.create_table_sql(table, indexes)],
            backward: vec![dialect.drop_table_if_exists_sql(&table.name)],
        }
    }

    /// One create-index statement per index, nothing to undo.
    pub fn create_indexes(dialect: Dialect, table: &str, indexes: &[IndexInfo]) -> Self {
        Self {
            table: table.to_string(),
            forward: indexes
                .iter()
                .map(|index| dialect.create_index_sql(table, index))
                .collect(),
            backward: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }
}

/// Run `script` against `driver`, stopping at the first failing statement.
pub async fn apply_script(driver: &mut dyn Driver, script: &MigrationScript) -> Result<()> {
    for statement in script.backward.iter().chain(&script.forward) {
        driver
            .execute(statement)
            .await
            .map_err(|e| CopyError::migration_apply(&script.table, statement, e))?;
    }
    Ok(())
}
