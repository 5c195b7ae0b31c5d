// ABOUTME: Database driver abstraction shared by every copy phase
// ABOUTME: Defines the Driver trait and opens a driver for an endpoint descriptor

pub mod dialect;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use dialect::Dialect;

use crate::config::EndpointConfig;
use crate::schema::{IndexInfo, TableSchema};
use crate::value::RowPage;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// One bounded, ordered read of a table.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub table: &'a TableSchema,
    /// Columns giving a total order over the table
    pub order_by: &'a [String],
    pub limit: u64,
    pub offset: u64,
}

/// Operations the copy phases need from a live database connection.
///
/// Every method takes `&mut self`: a driver wraps exactly one connection
/// and the copy runs one statement at a time.
#[async_trait]
pub trait Driver: Send {
    fn dialect(&self) -> Dialect;

    /// User tables in the endpoint's default schema, sorted by name.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Column layout of `table` in declaration order.
    async fn table_schema(&mut self, table: &str) -> Result<TableSchema>;

    /// Secondary indexes of `table`, primary key excluded.
    async fn table_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>>;

    /// Run one DDL or DML statement.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    async fn count_rows(&mut self, table: &str) -> Result<u64>;

    /// Fetch one page; the header follows `request.table` column order.
    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<RowPage>;

    /// Insert every row of `page`, mapping values by the page header.
    ///
    /// Returns the number of rows written.
    async fn import(&mut self, table: &str, page: &RowPage) -> Result<u64>;

    async fn truncate(&mut self, table: &str) -> Result<()> {
        let sql = self.dialect().truncate_sql(table);
        self.execute(&sql)
            .await
            .with_context(|| format!("Failed to truncate table '{}'", table))
    }

    /// Move the sequence behind `table`'s primary key past the copied data.
    ///
    /// Returns `false` when the dialect has nothing to reset.
    async fn reset_primary_key_sequence(&mut self, _table: &TableSchema) -> Result<bool> {
        Ok(false)
    }
}

/// Open a driver for an already normalized endpoint descriptor.
pub async fn connect(endpoint: &EndpointConfig) -> Result<Box<dyn Driver>> {
    endpoint.validate()?;

    let driver: Box<dyn Driver> = match endpoint.adapter {
        Dialect::Postgres => Box::new(postgres::PostgresDriver::connect(endpoint).await?),
        Dialect::Mysql => Box::new(mysql::MysqlDriver::connect(endpoint).await?),
        Dialect::Sqlite => Box::new(sqlite::SqliteDriver::open(&endpoint.database)?),
    };

    Ok(driver)
}

/// Split `rows` so that no statement binds more than `max_params` values.
pub(crate) fn rows_per_statement(columns: usize, max_params: usize) -> usize {
    if columns == 0 {
        return 1;
    }
    (max_params / columns).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(3, 65_535), 21_845);
        assert_eq!(rows_per_statement(70_000, 65_535), 1);
        assert_eq!(rows_per_statement(0, 65_535), 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_database() {
        let endpoint = EndpointConfig::new(Dialect::Sqlite, "");
        assert!(connect(&endpoint).await.is_err());
    }
}
