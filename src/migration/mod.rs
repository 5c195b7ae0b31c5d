// ABOUTME: Copy run orchestration across schema, data, index, and sequence phases
// ABOUTME: Owns both endpoints and aggregates per-table statistics into a report

pub mod endpoint;
pub mod indexes;
pub mod schema;
pub mod script;
pub mod sequences;
pub mod transfer;
pub mod transform;

pub use endpoint::Endpoint;
pub use indexes::copy_indices;
pub use schema::copy_schema;
pub use script::{apply_script, MigrationScript};
pub use sequences::reset_sequences;
pub use transfer::{copy_data, copy_table, CursorState, TransferCursor, TransferSettings};
pub use transform::{format_page, incorrect_blobs};

use crate::config::{CopierConfig, CopyOptions, DEFAULT_PAGE_SIZE};
use crate::drivers::Dialect;
use crate::progress::{ProgressSink, SilentProgress};
use crate::utils::format_elapsed;
use anyhow::{bail, Result};
use std::time::{Duration, Instant};

/// Rows and pages copied for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table: String,
    pub rows: u64,
    pub pages: u64,
}

/// Outcome of one copy run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    pub total_rows: u64,
    pub elapsed: Duration,
    pub tables: Vec<TableStats>,
}

impl TransferReport {
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_rows as f64 / secs
        } else {
            0.0
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableStats> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// One-line summary printed at the end of a run.
    pub fn summary(&self) -> String {
        format!(
            "Finished copying database ({} records) in {} ({:.0} r/s)",
            self.total_rows,
            format_elapsed(self.elapsed),
            self.rows_per_second()
        )
    }
}

/// Table listing of one endpoint with current row counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSummary {
    pub descriptor: String,
    pub dialect: Dialect,
    pub tables: Vec<(String, u64)>,
}

/// Runs copies between two verified endpoints.
pub struct DbCopier {
    source: Endpoint,
    destination: Endpoint,
    page_size: u64,
    progress: Box<dyn ProgressSink>,
}

impl DbCopier {
    pub fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            source,
            destination,
            page_size: DEFAULT_PAGE_SIZE,
            progress: Box::new(SilentProgress::default()),
        }
    }

    /// Verify both endpoints of `config` and build a copier for them.
    pub async fn connect(config: &CopierConfig) -> Result<Self> {
        config.validate()?;
        let source = Endpoint::connect(config.source.clone()).await?;
        let destination = Endpoint::connect(config.destination.clone()).await?;
        Ok(Self::new(source, destination).with_page_size(config.page_size))
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn source(&mut self) -> &mut Endpoint {
        &mut self.source
    }

    pub fn destination(&mut self) -> &mut Endpoint {
        &mut self.destination
    }

    /// Copy `tables` (every source table when `None`) in order.
    ///
    /// Phases run schema, data, indices, sequences; schema is skipped with
    /// `skip_schema` or `continue`, data with `skip_data`.
    pub async fn copy(
        &mut self,
        tables: Option<&[String]>,
        options: &CopyOptions,
    ) -> Result<TransferReport> {
        let tables = self.resolve_tables(tables)?;
        let start = Instant::now();
        let progress = self.progress.as_mut();

        tracing::info!(
            "Copying {} table(s) from {} to {}",
            tables.len(),
            self.source.descriptor(),
            self.destination.descriptor()
        );

        if options.runs_schema() {
            progress.phase("Copying schema");
            copy_schema(&mut self.source, &mut self.destination, &tables, progress).await?;
        } else {
            tracing::info!("Skipping schema");
        }

        let mut report = TransferReport::default();
        if options.skip_data {
            tracing::info!("Skipping data");
        } else {
            progress.phase("Copying data");
            let settings = TransferSettings {
                page_size: self.page_size,
                resume: options.resume,
                truncate_tables: options.truncate_tables,
            };
            report.tables = copy_data(
                &mut self.source,
                &mut self.destination,
                &tables,
                &settings,
                progress,
            )
            .await?;
            report.total_rows = report.tables.iter().map(|t| t.rows).sum();
        }

        progress.phase("Copying indices");
        copy_indices(&mut self.source, &mut self.destination, &tables, progress).await?;

        progress.phase("Resetting sequences");
        reset_sequences(&mut self.destination, &tables, progress).await?;

        report.elapsed = start.elapsed();
        progress.summary(&report);
        Ok(report)
    }

    /// List tables and row counts on both endpoints.
    pub async fn info(&mut self) -> Result<(EndpointSummary, EndpointSummary)> {
        let source = summarize(&mut self.source).await?;
        let destination = summarize(&mut self.destination).await?;
        Ok((source, destination))
    }

    fn resolve_tables(&self, requested: Option<&[String]>) -> Result<Vec<String>> {
        let available = self.source.tables();
        let Some(requested) = requested else {
            return Ok(available.to_vec());
        };

        for table in requested {
            if !available.contains(table) {
                bail!(
                    "Table '{}' does not exist on the source {}",
                    crate::utils::sanitize_identifier(table),
                    self.source.descriptor()
                );
            }
        }
        Ok(requested.to_vec())
    }
}

async fn summarize(endpoint: &mut Endpoint) -> Result<EndpointSummary> {
    let names = endpoint.refresh_tables().await?.to_vec();
    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let rows = endpoint.driver().count_rows(&name).await?;
        tables.push((name, rows));
    }
    Ok(EndpointSummary {
        descriptor: endpoint.descriptor().to_string(),
        dialect: endpoint.dialect(),
        tables,
    })
}
