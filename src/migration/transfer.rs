// ABOUTME: Paginated, resumable row copy from source to destination
// ABOUTME: Drives a per-table cursor and verifies the destination prefix before resuming

use super::endpoint::Endpoint;
use super::transform::{format_page, incorrect_blobs};
use super::TableStats;
use crate::drivers::{Driver, PageRequest};
use crate::error::CopyError;
use crate::progress::ProgressSink;
use crate::schema::TableSchema;
use crate::value::{canonical_time, utc_timestamp, Value};
use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    InProgress,
    Completed,
}

/// Position of one table transfer.
///
/// The offset moves by exactly `page_size` per page; a page shorter than
/// `page_size` (an empty one included) completes the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCursor {
    pub table: String,
    pub page_size: u64,
    pub offset: u64,
    /// Source row count when the transfer started
    pub total: u64,
    pub pages: u64,
    state: CursorState,
}

impl TransferCursor {
    pub fn new(table: impl Into<String>, page_size: u64, offset: u64, total: u64) -> Self {
        Self {
            table: table.into(),
            page_size,
            offset,
            total,
            pages: 0,
            state: CursorState::InProgress,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == CursorState::Completed
    }

    /// Record a fetched page of `rows` rows.
    pub fn advance(&mut self, rows: u64) {
        if self.is_completed() {
            return;
        }
        if rows == 0 {
            self.state = CursorState::Completed;
            return;
        }
        self.pages += 1;
        self.offset += self.page_size;
        if rows < self.page_size {
            self.state = CursorState::Completed;
        }
    }
}

/// Knobs for the data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub page_size: u64,
    pub resume: bool,
    pub truncate_tables: bool,
}

/// Copy every table in order; returns per-table statistics.
pub async fn copy_data(
    source: &mut Endpoint,
    destination: &mut Endpoint,
    tables: &[String],
    settings: &TransferSettings,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<TableStats>> {
    let mut stats = Vec::with_capacity(tables.len());
    for table in tables {
        stats.push(copy_table(source, destination, table, settings, progress).await?);
    }
    Ok(stats)
}

/// Copy one table page by page.
pub async fn copy_table(
    source: &mut Endpoint,
    destination: &mut Endpoint,
    table: &str,
    settings: &TransferSettings,
    progress: &mut dyn ProgressSink,
) -> Result<TableStats> {
    let schema = source.driver().table_schema(table).await?;
    let total = source.driver().count_rows(table).await?;

    let offset = if settings.resume {
        let copied = destination.driver().count_rows(table).await?;
        verify_resume(source.driver(), destination.driver(), &schema, copied, total).await?;
        copied
    } else {
        0
    };

    if settings.truncate_tables && offset == 0 {
        destination.driver().truncate(table).await?;
    }

    tracing::info!(
        "Copying table '{}' ({} rows, starting at {})",
        table,
        total,
        offset
    );

    let text_columns = incorrect_blobs(source.dialect(), &schema);
    let order_by = schema.order_by();
    let mut cursor = TransferCursor::new(table, settings.page_size, offset, total);
    let mut rows_copied = 0;

    progress.start(table, total);
    progress.advance(offset);

    while !cursor.is_completed() {
        let request = PageRequest {
            table: &schema,
            order_by: &order_by,
            limit: cursor.page_size,
            offset: cursor.offset,
        };
        let page = source.driver().fetch_page(&request).await?;
        let fetched = page.len() as u64;

        if fetched > 0 {
            let page = format_page(page, &schema, &text_columns)?;
            destination
                .driver()
                .import(table, &page)
                .await
                .with_context(|| {
                    format!("Failed to import page at offset {} of '{}'", cursor.offset, table)
                })?;
            rows_copied += fetched;
            progress.advance(fetched);
            tracing::debug!(
                "Copied {} rows of '{}' (offset {})",
                fetched,
                table,
                cursor.offset
            );
        }

        cursor.advance(fetched);
    }

    progress.finish();
    tracing::info!("  ✓ Copied {} rows into '{}'", rows_copied, table);

    Ok(TableStats {
        table: table.to_string(),
        rows: rows_copied,
        pages: cursor.pages,
    })
}

/// Check that the destination holds exactly the first `copied` source rows.
///
/// Keyed tables compare the key of the last copied row on both sides;
/// tables without a key can only be checked by count.
async fn verify_resume(
    source: &mut dyn Driver,
    destination: &mut dyn Driver,
    schema: &TableSchema,
    copied: u64,
    total: u64,
) -> Result<()> {
    if copied > total {
        return Err(CopyError::resume_mismatch(
            &schema.name,
            format!(
                "destination has {} rows but the source only has {}",
                copied, total
            ),
        )
        .into());
    }
    if copied == 0 {
        return Ok(());
    }

    let pk = schema.primary_key();
    if pk.is_empty() {
        tracing::warn!(
            "Table '{}' has no primary key; resuming at row {} without verifying copied rows",
            schema.name,
            copied
        );
        return Ok(());
    }

    let source_key = key_at(source, schema, &pk, copied - 1).await?;
    let destination_schema = destination.table_schema(&schema.name).await?;
    let destination_key = key_at(destination, &destination_schema, &pk, copied - 1).await?;

    match (source_key, destination_key) {
        (Some(src), Some(dst)) if src == dst => Ok(()),
        (src, dst) => Err(CopyError::resume_mismatch(
            &schema.name,
            format!(
                "row {} has key ({}) on the source but ({}) on the destination",
                copied,
                render_key(src.as_deref()),
                render_key(dst.as_deref())
            ),
        )
        .into()),
    }
}

/// Primary key values of the row at `position` under key ordering.
async fn key_at(
    driver: &mut dyn Driver,
    schema: &TableSchema,
    pk: &[String],
    position: u64,
) -> Result<Option<Vec<String>>> {
    let mut columns = Vec::with_capacity(pk.len());
    for name in pk {
        let column = schema.column(name).ok_or_else(|| {
            CopyError::resume_mismatch(
                &schema.name,
                format!("key column '{}' is missing on the destination", name),
            )
        })?;
        columns.push(column.clone());
    }
    let key_table = TableSchema::new(schema.name.clone(), columns);

    let page = driver
        .fetch_page(&PageRequest {
            table: &key_table,
            order_by: pk,
            limit: 1,
            offset: position,
        })
        .await?;

    Ok(page
        .rows
        .into_iter()
        .next()
        .map(|row| row.iter().map(key_text).collect()))
}

/// Dialect-neutral rendering so keys read from different engines compare.
///
/// Booleans become `1`/`0`; timestamps, times and decimals lose trailing
/// fractional zeros and timestamps their offset.
fn key_text(value: &Value) -> String {
    match value {
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Text(s) => utc_timestamp(s)
            .or_else(|| canonical_time(s))
            .or_else(|| trim_decimal(s))
            .unwrap_or_else(|| s.clone()),
        other => other.to_string(),
    }
}

/// `12.500` and `12.5` render alike; anything that is not a plain decimal
/// yields `None`.
fn trim_decimal(text: &str) -> Option<String> {
    let (whole, fraction) = text.split_once('.')?;
    let digits = whole.strip_prefix('-').unwrap_or(whole);
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(digits) || !all_digits(fraction) {
        return None;
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        Some(whole.to_string())
    } else {
        Some(format!("{}.{}", whole, fraction))
    }
}

fn render_key(key: Option<&[String]>) -> String {
    match key {
        Some(values) => values.join(", "),
        None => "no row".to_string(),
    }
}
