// ABOUTME: Table, column, and index descriptors read from a live database
// ABOUTME: Shared by every dialect driver and every copy phase

pub mod types;

pub use types::ColumnType;

/// One column as declared in the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Type string exactly as the catalog reports it (e.g. `varchar(255)`)
    pub db_type: String,
    pub primary_key: bool,
    pub nullable: bool,
    pub auto_increment: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
            primary_key: false,
            nullable: true,
            auto_increment: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::parse(&self.db_type)
    }
}

/// A table plus its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Primary key columns in declaration order.
    pub fn primary_key(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// Columns giving a stable total order for LIMIT/OFFSET pagination.
    ///
    /// The primary key when there is one, otherwise every column.
    pub fn order_by(&self) -> Vec<String> {
        let pk = self.primary_key();
        if pk.is_empty() {
            self.column_names()
        } else {
            pk
        }
    }

    /// The single auto-increment primary key column, if the table has one.
    pub fn serial_key(&self) -> Option<&ColumnInfo> {
        let mut pk = self.columns.iter().filter(|c| c.primary_key);
        match (pk.next(), pk.next()) {
            (Some(col), None) if col.auto_increment && col.column_type().is_integer() => Some(col),
            _ => None,
        }
    }
}

/// A secondary index; primary key indexes are never represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}
