// ABOUTME: PostgreSQL driver backed by tokio-postgres with TLS and keepalives
// ABOUTME: Introspects pg_catalog, pages rows, imports via text casts, resets sequences

use super::{rows_per_statement, Dialect, Driver, PageRequest};
use crate::config::EndpointConfig;
use crate::schema::{ColumnInfo, ColumnType, IndexInfo, TableSchema};
use crate::value::{RowPage, Value};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::time::Duration;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, Row};

pub struct PostgresDriver {
    client: Client,
    schema: String,
    /// Destination column types per table, filled on first import
    column_types: HashMap<String, HashMap<String, String>>,
}

/// Build connection settings from a descriptor, with TCP keepalives enabled
///
/// Keepalives prevent idle connection timeouts when connecting through load
/// balancers during long copies:
/// - keepalives on
/// - first probe after 60 seconds idle
/// - subsequent probes every 10 seconds
pub fn connection_config(endpoint: &EndpointConfig) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config.host(endpoint.host_or_default());
    if let Some(port) = endpoint.port_or_default() {
        config.port(port);
    }
    config.dbname(&endpoint.database);
    if let Some(user) = &endpoint.user {
        config.user(user);
    }
    if let Some(password) = &endpoint.password {
        config.password(password);
    }
    config.keepalives(true);
    config.keepalives_idle(Duration::from_secs(60));
    config.keepalives_interval(Duration::from_secs(10));
    config
}

/// Turn a raw driver error into a message that says what to check.
fn describe_connect_error(e: tokio_postgres::Error) -> anyhow::Error {
    let error_msg = e.to_string();

    if error_msg.contains("password authentication failed") {
        anyhow::anyhow!(
            "Authentication failed: Invalid username or password.\n\
             Please verify your database credentials."
        )
    } else if error_msg.contains("database") && error_msg.contains("does not exist") {
        anyhow::anyhow!(
            "Database does not exist: {}\n\
             Please create the database first or check the endpoint configuration.",
            error_msg
        )
    } else if error_msg.contains("Connection refused") || error_msg.contains("could not connect")
    {
        anyhow::anyhow!(
            "Connection refused: Unable to reach database server.\n\
             Please check:\n\
             - The host and port are correct\n\
             - The database server is running\n\
             - Firewall rules allow connections\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("timeout") || error_msg.contains("timed out") {
        anyhow::anyhow!(
            "Connection timeout: Database server did not respond in time.\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("no pg_hba.conf entry") {
        anyhow::anyhow!(
            "Access denied: No pg_hba.conf entry for host.\n\
             The database server is not configured to accept connections from your host.\n\
             Error: {}",
            error_msg
        )
    } else {
        anyhow::anyhow!("Failed to connect to database: {}", error_msg)
    }
}

impl PostgresDriver {
    pub async fn connect(endpoint: &EndpointConfig) -> Result<Self> {
        let schema = endpoint
            .schema
            .clone()
            .unwrap_or_else(|| "public".to_string());

        let tls_connector = TlsConnector::builder()
            .danger_accept_invalid_certs(false)
            .build()
            .context("Failed to build TLS connector")?;
        let tls = MakeTlsConnector::new(tls_connector);

        tracing::info!("Connecting to PostgreSQL at {}", endpoint);

        let (client, connection) = connection_config(endpoint)
            .connect(tls)
            .await
            .map_err(describe_connect_error)?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Connection error: {}", e);
            }
        });

        client
            .batch_execute(&format!(
                "SET search_path TO {}",
                Dialect::Postgres.quote_ident(&schema)
            ))
            .await
            .with_context(|| format!("Failed to select schema '{}'", schema))?;

        Ok(Self {
            client,
            schema,
            column_types: HashMap::new(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn qualified(&self, table: &str) -> String {
        format!(
            "{}.{}",
            Dialect::Postgres.quote_ident(&self.schema),
            Dialect::Postgres.quote_ident(table)
        )
    }

    /// Destination column types without their modifiers.
    ///
    /// Casting to `varchar(n)` explicitly truncates; casting to `varchar`
    /// leaves the length check to the assignment into the column.
    async fn destination_types(&mut self, table: &str) -> Result<&HashMap<String, String>> {
        if !self.column_types.contains_key(table) {
            let rows = self
                .client
                .query(
                    "SELECT a.attname::text, pg_catalog.format_type(a.atttypid, NULL)
                     FROM pg_catalog.pg_attribute a
                     JOIN pg_catalog.pg_class c ON a.attrelid = c.oid
                     JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
                     WHERE n.nspname = $1
                       AND c.relname = $2
                       AND a.attnum > 0
                       AND NOT a.attisdropped",
                    &[&self.schema, &table],
                )
                .await
                .with_context(|| format!("Failed to get column types for table '{}'", table))?;

            if rows.is_empty() {
                bail!(
                    "Table '{}' does not exist in schema '{}'",
                    table,
                    self.schema
                );
            }

            let types: HashMap<String, String> =
                rows.iter().map(|row| (row.get(0), row.get(1))).collect();
            self.column_types.insert(table.to_string(), types);
        }
        Ok(&self.column_types[table])
    }
}

/// Whether values of this declared type decode without a text cast.
fn decodes_natively(ty: &ColumnType) -> bool {
    matches!(
        ty,
        ColumnType::SmallInt
            | ColumnType::Integer
            | ColumnType::BigInt
            | ColumnType::Boolean
            | ColumnType::Real
            | ColumnType::Double
            | ColumnType::Char(_)
            | ColumnType::Varchar(_)
            | ColumnType::Text
            | ColumnType::Blob
    )
}

fn select_expr(column: &ColumnInfo) -> String {
    let quoted = Dialect::Postgres.quote_ident(&column.name);
    if decodes_natively(&column.column_type()) {
        quoted
    } else {
        format!("{}::text AS {}", quoted, quoted)
    }
}

/// Placeholder for parameter `n` bound into a column of `db_type`.
///
/// Everything except bytea travels as text and is cast server-side, which
/// keeps numeric, temporal and user-defined types lossless.
fn insert_placeholder(n: usize, db_type: Option<&str>) -> String {
    match db_type {
        Some(t) if ColumnType::parse(t) == ColumnType::Blob => format!("${}", n),
        Some(t) => format!("${}::text::{}", n, t),
        None => format!("${}::text", n),
    }
}

fn decode(row: &Row, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    let value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| Value::Int(v.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| Value::Int(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| Value::Int(v.into())),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| Value::Float(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Blob),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .with_context(|| {
                format!(
                    "Column '{}' has type '{}' which cannot be read as text",
                    column.name(),
                    column.type_()
                )
            })?
            .map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Binds a [`Value`] as either text or bytea.
#[derive(Debug)]
struct PgParam<'a>(&'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Blob(bytes) if *ty == Type::BYTEA => bytes.as_slice().to_sql(ty, out),
            other if *ty == Type::BYTEA => other.as_text().as_bytes().to_sql(ty, out),
            other => other.as_text().as_ref().to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::TEXT | Type::BYTEA)
    }

    to_sql_checked!();
}

#[async_trait]
impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT tablename::text FROM pg_catalog.pg_tables \
                 WHERE schemaname = $1 ORDER BY tablename",
                &[&self.schema],
            )
            .await
            .with_context(|| format!("Failed to list tables in schema '{}'", self.schema))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn table_schema(&mut self, table: &str) -> Result<TableSchema> {
        let rows = self
            .client
            .query(
                "SELECT
                    a.attname::text,
                    pg_catalog.format_type(a.atttypid, a.atttypmod),
                    a.attnotnull,
                    EXISTS (
                        SELECT 1 FROM pg_catalog.pg_index i
                        WHERE i.indrelid = c.oid AND i.indisprimary AND a.attnum = ANY(i.indkey)
                    ),
                    a.attidentity <> ''
                        OR pg_catalog.pg_get_serial_sequence(
                            pg_catalog.quote_ident(n.nspname) || '.' || pg_catalog.quote_ident(c.relname),
                            a.attname
                        ) IS NOT NULL
                 FROM pg_catalog.pg_attribute a
                 JOIN pg_catalog.pg_class c ON a.attrelid = c.oid
                 JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
                 WHERE n.nspname = $1
                   AND c.relname = $2
                   AND c.relkind IN ('r', 'p')
                   AND a.attnum > 0
                   AND NOT a.attisdropped
                 ORDER BY a.attnum",
                &[&self.schema, &table],
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to get columns for table '{}'.'{}'",
                    self.schema, table
                )
            })?;

        if rows.is_empty() {
            bail!(
                "Table '{}' does not exist in schema '{}'",
                table,
                self.schema
            );
        }

        let columns = rows
            .iter()
            .map(|row| {
                let not_null: bool = row.get(2);
                ColumnInfo {
                    name: row.get(0),
                    db_type: row.get(1),
                    primary_key: row.get(3),
                    nullable: !not_null,
                    auto_increment: row.get(4),
                }
            })
            .collect();

        Ok(TableSchema::new(table, columns))
    }

    async fn table_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>> {
        // expression and partial indexes have no portable column list
        let rows = self
            .client
            .query(
                "SELECT ic.relname::text, ix.indisunique, array_agg(a.attname::text ORDER BY k.ord)
                 FROM pg_catalog.pg_index ix
                 JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
                 JOIN pg_catalog.pg_class ic ON ic.oid = ix.indexrelid
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
                 CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                 JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
                 WHERE n.nspname = $1
                   AND t.relname = $2
                   AND NOT ix.indisprimary
                   AND ix.indexprs IS NULL
                   AND ix.indpred IS NULL
                   AND k.ord <= ix.indnkeyatts
                 GROUP BY ic.relname, ix.indisunique
                 ORDER BY ic.relname",
                &[&self.schema, &table],
            )
            .await
            .with_context(|| format!("Failed to list indexes of table '{}'", table))?;

        Ok(rows
            .iter()
            .map(|row| IndexInfo {
                name: row.get(0),
                unique: row.get(1),
                columns: row.get(2),
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        tracing::debug!("Executing on PostgreSQL: {}", sql);
        self.column_types.clear();
        self.client
            .batch_execute(sql)
            .await
            .with_context(|| format!("Failed to execute statement: {}", sql))
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table));
        let row = self
            .client
            .query_one(&sql, &[])
            .await
            .with_context(|| format!("Failed to count rows in table '{}'", table))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<RowPage> {
        let table = &request.table.name;
        let header = request.table.column_names();
        let select_list: Vec<String> = request.table.columns.iter().map(select_expr).collect();
        let sql = Dialect::Postgres.select_page_sql(
            table,
            &select_list,
            request.order_by,
            request.limit,
            request.offset,
        );

        let rows = self
            .client
            .query(&sql, &[])
            .await
            .with_context(|| format!("Failed to query rows from table '{}'", table))?;

        let mut page = RowPage::new(header);
        for row in &rows {
            let values = (0..row.len())
                .map(|idx| decode(row, idx))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Failed to decode row from table '{}'", table))?;
            page.rows.push(values);
        }
        Ok(page)
    }

    async fn import(&mut self, table: &str, page: &RowPage) -> Result<u64> {
        if page.is_empty() {
            return Ok(0);
        }

        let types = self.destination_types(table).await?;
        let placeholders_for = |base: usize| {
            page.header
                .iter()
                .enumerate()
                .map(|(i, col)| insert_placeholder(base + i + 1, types.get(col).map(String::as_str)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let width = page.header.len();
        let per_statement = rows_per_statement(width, Dialect::Postgres.max_bind_params());
        let prefix = Dialect::Postgres.insert_prefix(table, &page.header);
        let statements: Vec<(String, &[Vec<Value>])> = page
            .rows
            .chunks(per_statement)
            .map(|chunk| {
                let values = (0..chunk.len())
                    .map(|r| format!("({})", placeholders_for(r * width)))
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("{}{}", prefix, values), chunk)
            })
            .collect();

        let tx = self
            .client
            .transaction()
            .await
            .context("Failed to begin PostgreSQL import transaction")?;

        let mut written = 0;
        for (sql, chunk) in statements {
            let wrapped: Vec<PgParam<'_>> = chunk.iter().flatten().map(PgParam).collect();
            let params: Vec<&(dyn ToSql + Sync)> = wrapped
                .iter()
                .map(|p| p as &(dyn ToSql + Sync))
                .collect();

            written += tx.execute(&sql, &params).await.with_context(|| {
                format!("Failed to insert {} rows into '{}'", chunk.len(), table)
            })?;
        }

        tx.commit()
            .await
            .with_context(|| format!("Failed to commit import into '{}'", table))?;

        Ok(written)
    }

    async fn reset_primary_key_sequence(&mut self, table: &TableSchema) -> Result<bool> {
        let pk = table.primary_key();
        let [column] = pk.as_slice() else {
            return Ok(false);
        };

        let row = self
            .client
            .query_one(
                "SELECT pg_catalog.pg_get_serial_sequence($1, $2)",
                &[&self.qualified(&table.name), column],
            )
            .await
            .with_context(|| format!("Failed to look up sequence for '{}'", table.name))?;
        let sequence: Option<String> = row.get(0);
        let Some(sequence) = sequence else {
            return Ok(false);
        };

        let sql = format!(
            "SELECT pg_catalog.setval($1::text::regclass, COALESCE(MAX({}), 0) + 1, false) FROM {}",
            Dialect::Postgres.quote_ident(column),
            self.qualified(&table.name)
        );
        self.client
            .query_one(&sql, &[&sequence])
            .await
            .with_context(|| format!("Failed to reset sequence '{}'", sequence))?;

        tracing::debug!("Reset sequence '{}' for table '{}'", sequence, table.name);
        Ok(true)
    }
}
