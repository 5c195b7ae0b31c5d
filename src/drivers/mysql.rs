// ABOUTME: MySQL driver backed by mysql_async over the binary protocol
// ABOUTME: Introspects INFORMATION_SCHEMA, pages rows, and imports with multi-row inserts

use super::{rows_per_statement, Dialect, Driver, PageRequest};
use crate::config::EndpointConfig;
use crate::schema::{ColumnInfo, ColumnType, IndexInfo, TableSchema};
use crate::value::{utc_timestamp, RowPage, Value};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mysql_async::consts::ColumnType as WireType;
use mysql_async::prelude::*;
use mysql_async::{Column, Conn, Opts, OptsBuilder, Params, Row, TxOpts};
use std::collections::HashMap;

/// Collation id MySQL reports for binary strings.
const BINARY_CHARSET: u16 = 63;

pub struct MysqlDriver {
    conn: Conn,
    database: String,
    /// Destination column types per table, filled on first import
    column_types: HashMap<String, HashMap<String, ColumnType>>,
}

/// Build connection options from a descriptor.
pub fn connection_opts(endpoint: &EndpointConfig) -> Opts {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(endpoint.host_or_default())
        .db_name(Some(endpoint.database.clone()))
        .user(endpoint.user.clone())
        .pass(endpoint.password.clone());
    if let Some(port) = endpoint.port_or_default() {
        builder = builder.tcp_port(port);
    }
    Opts::from(builder)
}

impl MysqlDriver {
    pub async fn connect(endpoint: &EndpointConfig) -> Result<Self> {
        tracing::info!("Connecting to MySQL at {}", endpoint);

        let mut conn = Conn::new(connection_opts(endpoint))
            .await
            .context("Failed to create MySQL connection")?;

        // TIMESTAMP columns are read and written in UTC
        conn.query_drop("SET time_zone = '+00:00'")
            .await
            .context("Failed to set MySQL session time zone")?;

        tracing::debug!("Successfully connected to MySQL");

        Ok(Self {
            conn,
            database: endpoint.database.clone(),
            column_types: HashMap::new(),
        })
    }

    async fn destination_types(&mut self, table: &str) -> Result<&HashMap<String, ColumnType>> {
        if !self.column_types.contains_key(table) {
            let schema = self.table_schema(table).await?;
            let types = schema
                .columns
                .into_iter()
                .map(|c| {
                    let ty = c.column_type();
                    (c.name, ty)
                })
                .collect();
            self.column_types.insert(table.to_string(), types);
        }
        Ok(&self.column_types[table])
    }
}

fn is_blob_family(column: &Column) -> bool {
    matches!(
        column.column_type(),
        WireType::MYSQL_TYPE_TINY_BLOB
            | WireType::MYSQL_TYPE_MEDIUM_BLOB
            | WireType::MYSQL_TYPE_LONG_BLOB
            | WireType::MYSQL_TYPE_BLOB
    )
}

/// Render a DATE/DATETIME/TIMESTAMP the way MySQL prints it.
fn format_date(
    (year, month, day, hour, minute, second, micro): (u16, u8, u8, u8, u8, u8, u32),
    date_only: bool,
) -> String {
    let date = format!("{:04}-{:02}-{:02}", year, month, day);
    if date_only {
        return date;
    }
    let mut out = format!("{} {:02}:{:02}:{:02}", date, hour, minute, second);
    if micro > 0 {
        out.push_str(&format!(".{:06}", micro));
    }
    out
}

fn format_time(negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micro: u32) -> String {
    let sign = if negative { "-" } else { "" };
    let total_hours = days * 24 + u32::from(hours);
    let mut out = format!("{}{:02}:{:02}:{:02}", sign, total_hours, minutes, seconds);
    if micro > 0 {
        out.push_str(&format!(".{:06}", micro));
    }
    out
}

/// Decode one wire value.
///
/// Every BLOB-family column, TEXT included, comes back as [`Value::Blob`];
/// the transfer phase turns declared text columns back into strings.
fn from_mysql(value: mysql_async::Value, blob_family: bool, binary: bool, date_only: bool) -> Value {
    use mysql_async::Value as My;

    match value {
        My::NULL => Value::Null,
        My::Int(i) => Value::Int(i),
        My::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Text(u.to_string()),
        },
        My::Float(f) => Value::Float(f.into()),
        My::Double(d) => Value::Float(d),
        My::Bytes(bytes) if blob_family || binary => Value::Blob(bytes),
        My::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Blob(e.into_bytes()),
        },
        My::Date(y, mo, d, h, mi, s, us) => {
            Value::Text(format_date((y, mo, d, h, mi, s, us), date_only))
        }
        My::Time(neg, days, h, mi, s, us) => Value::Text(format_time(neg, days, h, mi, s, us)),
    }
}

fn to_mysql(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as My;

    match value {
        Value::Null => My::NULL,
        Value::Bool(b) => My::Int(i64::from(*b)),
        Value::Int(i) => My::Int(*i),
        Value::Float(f) => My::Double(*f),
        Value::Text(s) => My::Bytes(s.as_bytes().to_vec()),
        Value::Blob(b) => My::Bytes(b.clone()),
    }
}

/// Binary strings (BINARY, VARBINARY) share wire types with character
/// strings and differ only by collation. Numeric types also report the
/// binary collation, so only string wire types qualify.
/// Like [`to_mysql`], but timestamp text carrying an offset is moved to UTC;
/// DATETIME rejects offsets such as `+00`.
fn to_mysql_datetime(value: &Value) -> mysql_async::Value {
    match value {
        Value::Text(s) => match utc_timestamp(s) {
            Some(utc) => mysql_async::Value::Bytes(utc.into_bytes()),
            None => to_mysql(value),
        },
        other => to_mysql(other),
    }
}

fn is_binary_string(column: &Column) -> bool {
    column.character_set() == BINARY_CHARSET
        && matches!(
            column.column_type(),
            WireType::MYSQL_TYPE_VARCHAR
                | WireType::MYSQL_TYPE_VAR_STRING
                | WireType::MYSQL_TYPE_STRING
        )
}

fn decode_row(mut row: Row) -> Vec<Value> {
    let columns = row.columns();
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            from_mysql(
                row.take(idx).unwrap_or(mysql_async::Value::NULL),
                is_blob_family(column),
                is_binary_string(column),
                column.column_type() == WireType::MYSQL_TYPE_DATE,
            )
        })
        .collect()
}

/// Group STATISTICS rows (already ordered by index and position) into indexes.
///
/// Functional indexes report a NULL column and are skipped.
fn group_indexes(rows: Vec<(String, i64, Option<String>)>) -> Vec<IndexInfo> {
    let mut indexes: Vec<IndexInfo> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    for (name, non_unique, column) in rows {
        if skipped.contains(&name) {
            continue;
        }
        let Some(column) = column else {
            indexes.retain(|i| i.name != name);
            skipped.push(name);
            continue;
        };
        match indexes.last_mut() {
            Some(index) if index.name == name => index.columns.push(column),
            _ => indexes.push(IndexInfo {
                name,
                columns: vec![column],
                unique: non_unique == 0,
            }),
        }
    }
    indexes
}

#[async_trait]
impl Driver for MysqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let query = r#"
            SELECT TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ?
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let tables: Vec<String> = self
            .conn
            .exec(query, (self.database.as_str(),))
            .await
            .with_context(|| format!("Failed to list tables from database '{}'", self.database))?;

        tracing::debug!(
            "Found {} table(s) in database '{}'",
            tables.len(),
            self.database
        );

        Ok(tables)
    }

    async fn table_schema(&mut self, table: &str) -> Result<TableSchema> {
        let query = r#"
            SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, EXTRA
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<(String, String, String, String, String)> = self
            .conn
            .exec(query, (self.database.as_str(), table))
            .await
            .with_context(|| {
                format!(
                    "Failed to get columns for table '{}.{}'",
                    self.database, table
                )
            })?;

        if rows.is_empty() {
            bail!(
                "Table '{}' does not exist in database '{}'",
                table,
                self.database
            );
        }

        let columns = rows
            .into_iter()
            .map(|(name, db_type, nullable, key, extra)| ColumnInfo {
                name,
                db_type,
                primary_key: key == "PRI",
                nullable: nullable == "YES",
                auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
            })
            .collect();

        Ok(TableSchema::new(table, columns))
    }

    async fn table_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>> {
        let query = r#"
            SELECT INDEX_NAME, NON_UNIQUE, COLUMN_NAME
            FROM INFORMATION_SCHEMA.STATISTICS
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            AND INDEX_NAME <> 'PRIMARY'
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;

        let rows: Vec<(String, i64, Option<String>)> = self
            .conn
            .exec(query, (self.database.as_str(), table))
            .await
            .with_context(|| format!("Failed to list indexes of table '{}'", table))?;

        Ok(group_indexes(rows))
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        tracing::debug!("Executing on MySQL: {}", sql);
        self.column_types.clear();
        self.conn
            .query_drop(sql)
            .await
            .with_context(|| format!("Failed to execute statement: {}", sql))
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = Dialect::Mysql.count_sql(table);
        let count: Option<u64> = self
            .conn
            .exec_first(sql.as_str(), ())
            .await
            .with_context(|| format!("Failed to count rows in table '{}'", table))?;
        Ok(count.unwrap_or(0))
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<RowPage> {
        let table = &request.table.name;
        let header = request.table.column_names();
        let select_list: Vec<String> = header
            .iter()
            .map(|c| Dialect::Mysql.quote_ident(c))
            .collect();
        let sql = Dialect::Mysql.select_page_sql(
            table,
            &select_list,
            request.order_by,
            request.limit,
            request.offset,
        );

        // prepared statements use the binary protocol, which keeps types
        let rows: Vec<Row> = self
            .conn
            .exec(sql.as_str(), ())
            .await
            .with_context(|| format!("Failed to query rows from table '{}'", table))?;

        let mut page = RowPage::new(header);
        page.rows = rows.into_iter().map(decode_row).collect();
        Ok(page)
    }

    async fn import(&mut self, table: &str, page: &RowPage) -> Result<u64> {
        if page.is_empty() {
            return Ok(0);
        }

        let types = self.destination_types(table).await?;
        let temporal: Vec<bool> = page
            .header
            .iter()
            .map(|c| {
                matches!(
                    types.get(c),
                    Some(ColumnType::Timestamp | ColumnType::TimestampTz)
                )
            })
            .collect();

        let width = page.header.len();
        let per_statement = rows_per_statement(width, Dialect::Mysql.max_bind_params());
        let prefix = Dialect::Mysql.insert_prefix(table, &page.header);
        let tuple = format!("({})", vec!["?"; width].join(", "));

        let mut tx = self
            .conn
            .start_transaction(TxOpts::default())
            .await
            .context("Failed to begin MySQL import transaction")?;

        let mut written = 0u64;
        for chunk in page.rows.chunks(per_statement) {
            let sql = format!("{}{}", prefix, vec![tuple.as_str(); chunk.len()].join(", "));
            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|row| {
                    row.iter().zip(&temporal).map(|(value, is_temporal)| {
                        if *is_temporal {
                            to_mysql_datetime(value)
                        } else {
                            to_mysql(value)
                        }
                    })
                })
                .collect();

            tx.exec_drop(sql.as_str(), Params::Positional(params))
                .await
                .with_context(|| {
                    format!("Failed to insert {} rows into '{}'", chunk.len(), table)
                })?;
            written += chunk.len() as u64;
        }

        tx.commit()
            .await
            .with_context(|| format!("Failed to commit import into '{}'", table))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::Value as My;

    #[test]
    fn test_connection_opts_from_descriptor() {
        let mut endpoint = EndpointConfig::new(Dialect::Mysql, "shop");
        endpoint.host = Some("db.internal".to_string());
        endpoint.user = Some("root".to_string());

        let opts = connection_opts(&endpoint);
        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3306);
        assert_eq!(opts.db_name(), Some("shop"));
        assert_eq!(opts.user(), Some("root"));
    }

    #[test]
    fn test_blob_family_always_decodes_as_blob() {
        let text_in_blob = from_mysql(My::Bytes(b"hello".to_vec()), true, false, false);
        assert_eq!(text_in_blob, Value::Blob(b"hello".to_vec()));

        let varchar = from_mysql(My::Bytes(b"hello".to_vec()), false, false, false);
        assert_eq!(varchar, Value::Text("hello".to_string()));

        let varbinary = from_mysql(My::Bytes(b"hello".to_vec()), false, true, false);
        assert_eq!(varbinary, Value::Blob(b"hello".to_vec()));
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_blob() {
        let value = from_mysql(My::Bytes(vec![0xff, 0xfe]), false, false, false);
        assert_eq!(value, Value::Blob(vec![0xff, 0xfe]));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(from_mysql(My::Int(-5), false, false, false), Value::Int(-5));
        assert_eq!(from_mysql(My::UInt(7), false, false, false), Value::Int(7));
        assert_eq!(
            from_mysql(My::UInt(u64::MAX), false, false, false),
            Value::Text(u64::MAX.to_string())
        );
        assert_eq!(from_mysql(My::Double(2.5), false, false, false), Value::Float(2.5));
    }

    #[test]
    fn test_temporal_values() {
        let date = My::Date(2024, 3, 9, 0, 0, 0, 0);
        assert_eq!(
            from_mysql(date.clone(), false, false, true),
            Value::Text("2024-03-09".to_string())
        );
        assert_eq!(
            from_mysql(date, false, false, false),
            Value::Text("2024-03-09 00:00:00".to_string())
        );
        assert_eq!(
            from_mysql(My::Date(2024, 3, 9, 13, 5, 7, 250), false, false, false),
            Value::Text("2024-03-09 13:05:07.000250".to_string())
        );
        assert_eq!(
            from_mysql(My::Time(true, 1, 2, 3, 4, 0), false, false, false),
            Value::Text("-26:03:04".to_string())
        );
    }

    #[test]
    fn test_to_mysql() {
        assert_eq!(to_mysql(&Value::Null), My::NULL);
        assert_eq!(to_mysql(&Value::Bool(true)), My::Int(1));
        assert_eq!(
            to_mysql(&Value::Text("x".into())),
            My::Bytes(b"x".to_vec())
        );
    }

    #[test]
    fn test_datetime_values_lose_their_offset() {
        assert_eq!(
            to_mysql_datetime(&Value::Text("2024-03-09 13:05:07.25+00".into())),
            My::Bytes(b"2024-03-09 13:05:07.250".to_vec())
        );
        assert_eq!(
            to_mysql_datetime(&Value::Text("2024-03-09 15:05:07+02:00".into())),
            My::Bytes(b"2024-03-09 13:05:07".to_vec())
        );
        assert_eq!(
            to_mysql_datetime(&Value::Text("2024-03-09 13:05:07".into())),
            My::Bytes(b"2024-03-09 13:05:07".to_vec())
        );
        assert_eq!(
            to_mysql_datetime(&Value::Text("infinity".into())),
            My::Bytes(b"infinity".to_vec())
        );
        assert_eq!(to_mysql_datetime(&Value::Null), My::NULL);
    }

    #[test]
    fn test_group_indexes() {
        let rows = vec![
            ("idx_email".to_string(), 0, Some("email".to_string())),
            ("idx_expr".to_string(), 1, None),
            ("idx_name".to_string(), 1, Some("last".to_string())),
            ("idx_name".to_string(), 1, Some("first".to_string())),
        ];
        let indexes = group_indexes(rows);

        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].name, "idx_email");
        assert!(indexes[0].unique);
        assert_eq!(indexes[1].columns, vec!["last", "first"]);
        assert!(!indexes[1].unique);
    }

    // NOTE: requires a real MySQL instance
    #[tokio::test]
    #[ignore]
    async fn test_connect_and_list_tables() {
        let database = std::env::var("TEST_MYSQL_DATABASE")
            .expect("TEST_MYSQL_DATABASE must be set for integration tests");
        let mut endpoint = EndpointConfig::new(Dialect::Mysql, database);
        endpoint.user = std::env::var("TEST_MYSQL_USER").ok();
        endpoint.password = std::env::var("TEST_MYSQL_PASSWORD").ok();

        let mut driver = MysqlDriver::connect(&endpoint).await.unwrap();
        let tables = driver.list_tables().await.unwrap();
        println!("Found {} tables", tables.len());
    }
}
