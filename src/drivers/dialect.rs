// ABOUTME: SQL syntax and type rendering for each supported database engine
// ABOUTME: Produces the DDL and paged SELECTs the copy phases send to drivers

use crate::schema::{ColumnType, IndexInfo, TableSchema};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// Length MySQL gets for unbounded text it has to index; 255 utf8mb4
/// characters stay under the 3072-byte InnoDB key limit, even in
/// three-column keys.
const MYSQL_KEY_LENGTH: u32 = 255;

/// A SQL engine variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mysql2")]
    Mysql,
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Dialect::Postgres => Some(5432),
            Dialect::Mysql => Some(3306),
            Dialect::Sqlite => None,
        }
    }

    /// MySQL reports TEXT and BLOB columns with the same wire type, so text
    /// values arrive as raw bytes and have to be turned back into strings.
    pub fn conflates_text_and_blob(&self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// MySQL index names only have to be unique within their table; the
    /// other engines share one namespace per schema.
    pub fn scopes_index_names_per_table(&self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// Upper bound on bind parameters in one statement.
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Postgres | Dialect::Mysql => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }

    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render a portable column type as this dialect spells it.
    pub fn render_type(&self, ty: &ColumnType) -> String {
        match self {
            Dialect::Postgres => render_postgres(ty),
            Dialect::Mysql => render_mysql(ty),
            Dialect::Sqlite => render_sqlite(ty),
        }
    }

    fn render_serial(&self, ty: &ColumnType) -> String {
        match (self, ty) {
            (Dialect::Postgres, ColumnType::SmallInt) => "smallserial".to_string(),
            (Dialect::Postgres, ColumnType::BigInt) => "bigserial".to_string(),
            (Dialect::Postgres, _) => "serial".to_string(),
            (Dialect::Sqlite, _) => "integer".to_string(),
            (Dialect::Mysql, ty) => self.render_type(ty),
        }
    }

    /// Column type for a column that is part of a key or an index.
    ///
    /// MySQL cannot index TEXT or BLOB without a prefix length, so unbounded
    /// strings become bounded varchar/varbinary there.
    fn render_key_type(&self, ty: &ColumnType) -> String {
        match (self, ty) {
            (Dialect::Mysql, ColumnType::Text | ColumnType::Varchar(None)) => {
                format!("varchar({})", MYSQL_KEY_LENGTH)
            }
            (Dialect::Mysql, ColumnType::Blob) => format!("varbinary({})", MYSQL_KEY_LENGTH),
            _ => self.render_type(ty),
        }
    }

    /// CREATE TABLE for `table`, without secondary indexes.
    ///
    /// `indexes` are the indexes that will be built later; their columns are
    /// typed so the index can be created.
    pub fn create_table_sql(&self, table: &TableSchema, indexes: &[IndexInfo]) -> String {
        let serial = table.serial_key().map(|c| c.name.as_str());
        let pk = table.primary_key();
        let keyed: HashSet<&str> = pk
            .iter()
            .chain(indexes.iter().flat_map(|index| &index.columns))
            .map(String::as_str)
            .collect();
        let mut lines = Vec::with_capacity(table.columns.len() + 1);

        for col in &table.columns {
            let ty = col.column_type();
            let is_serial = serial == Some(col.name.as_str());
            let mut line = format!("  {} ", self.quote_ident(&col.name));

            if is_serial {
                line.push_str(&self.render_serial(&ty));
                match self {
                    Dialect::Sqlite => line.push_str(" PRIMARY KEY AUTOINCREMENT"),
                    Dialect::Mysql => line.push_str(" NOT NULL AUTO_INCREMENT"),
                    Dialect::Postgres => line.push_str(" NOT NULL"),
                }
            } else {
                if keyed.contains(col.name.as_str()) {
                    line.push_str(&self.render_key_type(&ty));
                } else {
                    line.push_str(&self.render_type(&ty));
                }
                if !col.nullable {
                    line.push_str(" NOT NULL");
                }
            }
            lines.push(line);
        }

        let inline_pk = *self == Dialect::Sqlite && serial.is_some();
        if !pk.is_empty() && !inline_pk {
            lines.push(format!("  PRIMARY KEY ({})", self.quote_list(&pk)));
        }

        format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_ident(&table.name),
            lines.join(",\n")
        )
    }

    pub fn drop_table_if_exists_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_ident(table))
    }

    pub fn create_index_sql(&self, table: &str, index: &IndexInfo) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_ident(&index.name),
            self.quote_ident(table),
            self.quote_list(&index.columns)
        )
    }

    pub fn truncate_sql(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("DELETE FROM {}", self.quote_ident(table)),
            Dialect::Postgres | Dialect::Mysql => {
                format!("TRUNCATE TABLE {}", self.quote_ident(table))
            }
        }
    }

    pub fn count_sql(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.quote_ident(table))
    }

    /// One page of `table` under a deterministic ordering.
    ///
    /// `select_list` holds ready-made expressions so drivers can wrap
    /// columns they cannot decode natively.
    pub fn select_page_sql(
        &self,
        table: &str,
        select_list: &[String],
        order_by: &[String],
        limit: u64,
        offset: u64,
    ) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            self.quote_ident(table)
        );
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.quote_list(order_by));
        }
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        sql
    }

    /// Multi-row INSERT header: `INSERT INTO t (a, b) VALUES `.
    pub fn insert_prefix(&self, table: &str, header: &[String]) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ",
            self.quote_ident(table),
            self.quote_list(header)
        )
    }
}

fn render_postgres(ty: &ColumnType) -> String {
    match ty {
        ColumnType::SmallInt => "smallint".to_string(),
        ColumnType::Integer => "integer".to_string(),
        ColumnType::BigInt => "bigint".to_string(),
        ColumnType::Boolean => "boolean".to_string(),
        ColumnType::Real => "real".to_string(),
        ColumnType::Double => "double precision".to_string(),
        ColumnType::Decimal { precision, scale } => render_decimal("numeric", *precision, *scale),
        ColumnType::Char(n) => render_sized("char", *n),
        ColumnType::Varchar(n) => render_sized("varchar", *n),
        ColumnType::Text => "text".to_string(),
        ColumnType::Blob => "bytea".to_string(),
        ColumnType::Date => "date".to_string(),
        ColumnType::Time => "time".to_string(),
        ColumnType::Timestamp => "timestamp".to_string(),
        ColumnType::TimestampTz => "timestamptz".to_string(),
        ColumnType::Json => "jsonb".to_string(),
        ColumnType::Uuid => "uuid".to_string(),
        ColumnType::Other(s) => s.clone(),
    }
}

fn render_mysql(ty: &ColumnType) -> String {
    match ty {
        ColumnType::SmallInt => "smallint".to_string(),
        ColumnType::Integer => "int".to_string(),
        ColumnType::BigInt => "bigint".to_string(),
        ColumnType::Boolean => "tinyint(1)".to_string(),
        ColumnType::Real => "float".to_string(),
        ColumnType::Double => "double".to_string(),
        ColumnType::Decimal {
            precision: None, ..
        } => "decimal(65,30)".to_string(),
        ColumnType::Decimal { precision, scale } => render_decimal("decimal", *precision, *scale),
        ColumnType::Char(n) => render_sized("char", *n),
        // MySQL has no unbounded varchar
        ColumnType::Varchar(None) | ColumnType::Text => "longtext".to_string(),
        ColumnType::Varchar(n) => render_sized("varchar", *n),
        ColumnType::Blob => "longblob".to_string(),
        ColumnType::Date => "date".to_string(),
        ColumnType::Time => "time".to_string(),
        ColumnType::Timestamp | ColumnType::TimestampTz => "datetime".to_string(),
        ColumnType::Json => "json".to_string(),
        ColumnType::Uuid => "char(36)".to_string(),
        ColumnType::Other(s) => s.clone(),
    }
}

fn render_sqlite(ty: &ColumnType) -> String {
    match ty {
        ColumnType::SmallInt => "smallint".to_string(),
        ColumnType::Integer => "integer".to_string(),
        ColumnType::BigInt => "bigint".to_string(),
        ColumnType::Boolean => "boolean".to_string(),
        ColumnType::Real => "real".to_string(),
        ColumnType::Double => "double".to_string(),
        ColumnType::Decimal { precision, scale } => render_decimal("numeric", *precision, *scale),
        ColumnType::Char(n) => render_sized("char", *n),
        ColumnType::Varchar(n) => render_sized("varchar", *n),
        // json would get NUMERIC affinity and turn "42" into an integer
        ColumnType::Text | ColumnType::Json => "text".to_string(),
        ColumnType::Blob => "blob".to_string(),
        ColumnType::Date => "date".to_string(),
        ColumnType::Time => "time".to_string(),
        ColumnType::Timestamp => "timestamp".to_string(),
        ColumnType::TimestampTz => "timestamptz".to_string(),
        ColumnType::Uuid => "varchar(36)".to_string(),
        ColumnType::Other(s) => s.clone(),
    }
}

fn render_sized(name: &str, size: Option<u32>) -> String {
    match size {
        Some(n) => format!("{}({})", name, n),
        None => name.to_string(),
    }
}

fn render_decimal(name: &str, precision: Option<u32>, scale: Option<u32>) -> String {
    match (precision, scale) {
        (Some(p), Some(s)) => format!("{}({},{})", name, p, s),
        (Some(p), None) => format!("{}({})", name, p),
        _ => name.to_string(),
    }
}
