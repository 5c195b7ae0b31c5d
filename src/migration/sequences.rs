// ABOUTME: Sequence phase: moves destination key sequences past copied rows
// ABOUTME: Only dialects with standalone sequences have anything to reset

use super::endpoint::Endpoint;
use crate::progress::ProgressSink;
use anyhow::Result;

/// Reset the primary key sequence of every table that has one.
///
/// Returns the number of sequences reset.
pub async fn reset_sequences(
    destination: &mut Endpoint,
    tables: &[String],
    progress: &mut dyn ProgressSink,
) -> Result<usize> {
    let mut reset = 0;
    progress.start("sequences", tables.len() as u64);

    for table in tables {
        let schema = destination.driver().table_schema(table).await?;
        if destination.driver().reset_primary_key_sequence(&schema).await? {
            reset += 1;
        }
        progress.advance(1);
    }

    progress.finish();
    if reset > 0 {
        tracing::info!("  ✓ Reset {} sequence(s)", reset);
    }
    Ok(reset)
}
