// ABOUTME: Schema phase: recreates source tables on the destination
// ABOUTME: Builds drop/create scripts per table in the destination dialect

use super::endpoint::Endpoint;
use super::script::{apply_script, MigrationScript};
use crate::progress::ProgressSink;
use anyhow::Result;

/// Drop and recreate each table on the destination from the source layout.
///
/// Indexes are left for [`super::indexes::copy_indices`], after the data
/// is loaded.
pub async fn copy_schema(
    source: &mut Endpoint,
    destination: &mut Endpoint,
    tables: &[String],
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    let dialect = destination.dialect();
    progress.start("schema", tables.len() as u64);

    for table in tables {
        let schema = source.driver().table_schema(table).await?;
        let indexes = source.driver().table_indexes(table).await?;
        let script = MigrationScript::create_table(dialect, &schema, &indexes);

        tracing::debug!("Creating table '{}': {}", table, script.forward.join("; "));
        apply_script(destination.driver(), &script).await?;
        progress.advance(1);
    }

    progress.finish();
    tracing::info!("  ✓ Created {} table(s) on {}", tables.len(), dialect);
    Ok(())
}
