// ABOUTME: Security tests for identifier quoting, credential masking, and endpoint safety
// ABOUTME: Validates that hostile names are copied as data and passwords never reach messages

use db_copier::config::{parse_config, CopyOptions, EndpointConfig};
use db_copier::drivers::Dialect;
use db_copier::migration::{DbCopier, Endpoint};
use db_copier::CopyError;
use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

fn sqlite_endpoint(path: &Path) -> EndpointConfig {
    EndpointConfig::new(Dialect::Sqlite, path.to_str().unwrap())
}

// ============================================================================
// SQL Injection Prevention Tests
// ============================================================================

#[tokio::test]
async fn test_hostile_identifiers_are_quoted_not_executed() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.db");
    let destination = dir.path().join("destination.db");

    let conn = Connection::open(&source).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob');

        CREATE TABLE "users""; DROP TABLE users; --" (
            id INTEGER PRIMARY KEY,
            "select" TEXT,
            "weird ""col""" TEXT
        );
        INSERT INTO "users""; DROP TABLE users; --" VALUES (1, 'from', 'where');
        CREATE INDEX "idx""; DELETE FROM users; --" ON "users""; DROP TABLE users; --" ("select");
        "#,
    )
    .unwrap();
    drop(conn);

    let mut copier = DbCopier::new(
        Endpoint::connect(sqlite_endpoint(&source)).await.unwrap(),
        Endpoint::connect(sqlite_endpoint(&destination)).await.unwrap(),
    );
    let report = copier.copy(None, &CopyOptions::default()).await.unwrap();
    assert_eq!(report.total_rows, 3);

    let dest = Connection::open(&destination).unwrap();
    let users: i64 = dest
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 2, "users table must survive hostile names");

    let (select, weird): (String, String) = dest
        .query_row(
            r#"SELECT "select", "weird ""col""" FROM "users""; DROP TABLE users; --""#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(select, "from");
    assert_eq!(weird, "where");
}

#[test]
fn test_quote_ident_escapes_each_dialect() {
    assert_eq!(Dialect::Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
    assert_eq!(Dialect::Sqlite.quote_ident("a\"b"), "\"a\"\"b\"");
    assert_eq!(Dialect::Mysql.quote_ident("a`b"), "`a``b`");
}

// ============================================================================
// Credential Leakage Prevention Tests
// ============================================================================

#[test]
fn test_descriptor_display_masks_password() {
    let mut endpoint = EndpointConfig::new(Dialect::Postgres, "mydb");
    endpoint.user = Some("admin".to_string());
    endpoint.password = Some("secretpass123".to_string());
    endpoint.host = Some("host.com".to_string());

    let shown = endpoint.to_string();
    assert!(!shown.contains("secretpass123"), "Password should be masked");
    assert!(shown.contains("admin"), "Username should be preserved");
    assert!(shown.contains("host.com"), "Host should be preserved");
}

#[tokio::test]
async fn test_connection_errors_dont_leak_credentials() {
    let mut endpoint = EndpointConfig::new(Dialect::Mysql, "mydb");
    endpoint.host = Some("127.0.0.1".to_string());
    endpoint.port = Some(1);
    endpoint.user = Some("admin".to_string());
    endpoint.password = Some("secretpass".to_string());

    let err = Endpoint::connect(endpoint).await.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<CopyError>(),
        Some(CopyError::Connection { .. })
    ));

    let full = format!("{:?}", err);
    assert!(
        !full.contains("secretpass"),
        "Error chain should not contain password: {}",
        full
    );
}

// ============================================================================
// Data Loss Prevention Tests
// ============================================================================

#[test]
fn test_same_source_and_destination_is_rejected() {
    let raw = r#"
        [source]
        adapter = "postgres"
        host = "DB.example.com"
        database = "app"

        [destination]
        adapter = "postgresql"
        host = "db.example.com"
        port = 5432
        database = "app"
        schema = "public"
    "#;

    let err = parse_config(raw).unwrap_err();
    assert!(
        format!("{:#}", err).contains("same database"),
        "Got: {:#}",
        err
    );
}

#[test]
fn test_same_sqlite_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.db");
    Connection::open(&path).unwrap();

    let raw = format!(
        "[source]\nadapter = \"sqlite\"\ndatabase = \"{}\"\n\n[destination]\nadapter = \"sqlite3\"\ndatabase = \"{}\"\n",
        path.display(),
        dir.path().join(".").join("app.db").display()
    );
    assert!(parse_config(&raw).is_err());
}
