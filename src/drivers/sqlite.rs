// ABOUTME: SQLite driver backed by rusqlite
// ABOUTME: Reads catalog pragmas, pages rows, and imports pages in one transaction

use super::{Dialect, Driver, PageRequest};
use crate::schema::{ColumnInfo, IndexInfo, TableSchema};
use crate::value::{RowPage, Value};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::types::Value as SqliteValue;
use rusqlite::Connection;

pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Open (or create) the database file at `path`.
    ///
    /// `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        if path.is_empty() {
            bail!("SQLite file path cannot be empty");
        }

        tracing::info!("Opening SQLite database: {}", path);

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path))?;

        // Verify we can query the database
        let _version: String = conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .context("Failed to query SQLite version (database may be corrupted)")?;

        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn quote(&self, name: &str) -> String {
        Dialect::Sqlite.quote_ident(name)
    }

    fn index_columns(&self, index: &str) -> Result<Vec<Option<String>>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_info({})", self.quote(index)))
            .with_context(|| format!("Failed to read columns of index '{}'", index))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to collect columns of index '{}'", index))?;
        Ok(columns)
    }
}

fn from_sqlite(value: SqliteValue) -> Value {
    match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(i) => Value::Int(i),
        SqliteValue::Real(f) => Value::Float(f),
        SqliteValue::Text(s) => Value::Text(s),
        SqliteValue::Blob(b) => Value::Blob(b),
    }
}

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Blob(b) => SqliteValue::Blob(b.clone()),
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        tracing::debug!("Listing tables from SQLite database");

        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type='table' \
                 AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .context("Failed to prepare statement to list tables")?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query table list")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to collect table names")?;

        Ok(tables)
    }

    async fn table_schema(&mut self, table: &str) -> Result<TableSchema> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", self.quote(table)))
            .with_context(|| format!("Failed to get table info for '{}'", table))?;

        // cid, name, type, notnull, dflt_value, pk
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .context("Failed to query table columns")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect table columns")?;

        if rows.is_empty() {
            bail!("Table '{}' does not exist in SQLite database", table);
        }

        let pk_count = rows.iter().filter(|r| r.3 > 0).count();
        let columns = rows
            .into_iter()
            .map(|(name, db_type, not_null, pk)| {
                let primary_key = pk > 0;
                ColumnInfo {
                    name,
                    // a lone INTEGER PRIMARY KEY aliases the rowid
                    auto_increment: primary_key
                        && pk_count == 1
                        && db_type.eq_ignore_ascii_case("integer"),
                    db_type,
                    primary_key,
                    nullable: !not_null && !primary_key,
                }
            })
            .collect();

        Ok(TableSchema::new(table, columns))
    }

    async fn table_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_list({})", self.quote(table)))
            .with_context(|| format!("Failed to list indexes of '{}'", table))?;

        // seq, name, unique, origin, partial
        let listed = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })
            .context("Failed to query index list")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect index list")?;
        drop(stmt);

        let mut indexes = Vec::new();
        for (name, unique, origin, partial) in listed {
            if origin == "pk" {
                continue;
            }
            if partial {
                tracing::warn!("Skipping partial index '{}' on '{}'", name, table);
                continue;
            }

            let columns: Option<Vec<String>> = self.index_columns(&name)?.into_iter().collect();
            let Some(columns) = columns else {
                tracing::warn!("Skipping expression index '{}' on '{}'", name, table);
                continue;
            };

            // UNIQUE constraints surface as unnamed autoindexes
            let name = if name.starts_with("sqlite_autoindex_") {
                format!("{}_{}_key", table, columns.join("_"))
            } else {
                name
            };
            indexes.push(IndexInfo {
                name,
                columns,
                unique,
            });
        }

        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        tracing::debug!("Executing on SQLite: {}", sql);
        self.conn
            .execute_batch(sql)
            .with_context(|| format!("Failed to execute statement: {}", sql))
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&Dialect::Sqlite.count_sql(table), [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows in table '{}'", table))?;
        Ok(count as u64)
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<RowPage> {
        let table = &request.table.name;
        let header = request.table.column_names();
        let select_list: Vec<String> = header.iter().map(|c| self.quote(c)).collect();
        let sql = Dialect::Sqlite.select_page_sql(
            table,
            &select_list,
            request.order_by,
            request.limit,
            request.offset,
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare page query for table '{}'", table))?;

        let width = header.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get::<_, SqliteValue>(idx).map(from_sqlite))
                    .collect::<Result<Vec<_>, _>>()
            })
            .with_context(|| format!("Failed to query rows from table '{}'", table))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to collect rows from table '{}'", table))?;

        Ok(RowPage { header, rows })
    }

    async fn import(&mut self, table: &str, page: &RowPage) -> Result<u64> {
        if page.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; page.header.len()].join(", ");
        let sql = format!(
            "{}({})",
            Dialect::Sqlite.insert_prefix(table, &page.header),
            placeholders
        );

        let tx = self
            .conn
            .transaction()
            .context("Failed to begin SQLite import transaction")?;
        {
            let mut stmt = tx
                .prepare(&sql)
                .with_context(|| format!("Failed to prepare insert into '{}'", table))?;
            for row in &page.rows {
                stmt.execute(rusqlite::params_from_iter(row.iter().map(to_sqlite)))
                    .with_context(|| format!("Failed to insert row into '{}'", table))?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to commit import into '{}'", table))?;

        Ok(page.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> SqliteDriver {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name VARCHAR(40) NOT NULL,
                email TEXT,
                avatar BLOB
            );
            CREATE UNIQUE INDEX users_email_index ON users (email);
            CREATE TABLE memberships (
                user_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL,
                role TEXT UNIQUE,
                PRIMARY KEY (user_id, group_id)
            );
            INSERT INTO users VALUES (1, 'Alice', 'alice@example.com', X'48656c6c6f');
            INSERT INTO users VALUES (2, 'Bob', NULL, NULL);
            INSERT INTO users VALUES (3, 'Charlie', 'charlie@example.com', NULL);",
        )
        .unwrap();
        SqliteDriver::from_connection(conn)
    }

    #[tokio::test]
    async fn test_list_tables_is_sorted() {
        let mut driver = create_test_db();
        assert_eq!(
            driver.list_tables().await.unwrap(),
            vec!["memberships", "users"]
        );
    }

    #[tokio::test]
    async fn test_table_schema() {
        let mut driver = create_test_db();
        let schema = driver.table_schema("users").await.unwrap();

        assert_eq!(schema.column_names(), vec!["id", "name", "email", "avatar"]);
        let id = schema.column("id").unwrap();
        assert!(id.primary_key && id.auto_increment && !id.nullable);
        let name = schema.column("name").unwrap();
        assert_eq!(name.db_type, "VARCHAR(40)");
        assert!(!name.nullable);
        assert!(schema.column("email").unwrap().nullable);
    }

    #[tokio::test]
    async fn test_composite_key_is_not_auto_increment() {
        let mut driver = create_test_db();
        let schema = driver.table_schema("memberships").await.unwrap();
        assert_eq!(schema.primary_key(), vec!["user_id", "group_id"]);
        assert!(schema.columns.iter().all(|c| !c.auto_increment));
    }

    #[tokio::test]
    async fn test_table_schema_missing_table() {
        let mut driver = create_test_db();
        let result = driver.table_schema("nope").await;
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_table_indexes() {
        let mut driver = create_test_db();

        let users = driver.table_indexes("users").await.unwrap();
        assert_eq!(
            users,
            vec![IndexInfo {
                name: "users_email_index".to_string(),
                columns: vec!["email".to_string()],
                unique: true,
            }]
        );

        // the UNIQUE column constraint gets a readable name, the pk is skipped
        let memberships = driver.table_indexes("memberships").await.unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].name, "memberships_role_key");
        assert!(memberships[0].unique);
    }

    #[tokio::test]
    async fn test_fetch_page_orders_and_limits() {
        let mut driver = create_test_db();
        let schema = driver.table_schema("users").await.unwrap();
        let order_by = schema.order_by();

        let page = driver
            .fetch_page(&PageRequest {
                table: &schema,
                order_by: &order_by,
                limit: 2,
                offset: 1,
            })
            .await
            .unwrap();

        assert_eq!(page.header, vec!["id", "name", "email", "avatar"]);
        assert_eq!(page.len(), 2);
        assert_eq!(page.rows[0][0], Value::Int(2));
        assert_eq!(page.rows[0][2], Value::Null);
        assert_eq!(page.rows[1][1], Value::Text("Charlie".to_string()));
    }

    #[tokio::test]
    async fn test_import_maps_by_header() {
        let mut driver = create_test_db();
        let page = RowPage {
            header: vec!["name".to_string(), "id".to_string(), "avatar".to_string()],
            rows: vec![vec![
                Value::Text("Dora".to_string()),
                Value::Int(10),
                Value::Blob(vec![1, 2, 3]),
            ]],
        };

        assert_eq!(driver.import("users", &page).await.unwrap(), 1);

        let (name, avatar): (String, Vec<u8>) = driver
            .connection()
            .query_row("SELECT name, avatar FROM users WHERE id = 10", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "Dora");
        assert_eq!(avatar, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_truncate_and_count() {
        let mut driver = create_test_db();
        assert_eq!(driver.count_rows("users").await.unwrap(), 3);
        driver.truncate("users").await.unwrap();
        assert_eq!(driver.count_rows("users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sequences_are_not_reset() {
        let mut driver = create_test_db();
        let schema = driver.table_schema("users").await.unwrap();
        assert!(!driver.reset_primary_key_sequence(&schema).await.unwrap());
    }
}
