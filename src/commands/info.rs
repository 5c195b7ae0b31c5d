// ABOUTME: Info command: lists tables and row counts on both endpoints
// ABOUTME: Useful as a connectivity check before starting a copy

use crate::config::load_config_from_file;
use crate::migration::{DbCopier, EndpointSummary};
use anyhow::Result;

/// Print table listings for the source and destination of a config file.
pub async fn info(config_path: &str) -> Result<()> {
    let config = load_config_from_file(config_path)?;
    let mut copier = DbCopier::connect(&config).await?;
    let (source, destination) = copier.info().await?;

    println!("{}", render("Source", &source));
    println!("{}", render("Destination", &destination));
    Ok(())
}

fn render(label: &str, summary: &EndpointSummary) -> String {
    let mut out = format!(
        "{}: {} [{}] ({} tables)",
        label,
        summary.descriptor,
        summary.dialect,
        summary.tables.len()
    );
    for (table, rows) in &summary.tables {
        out.push_str(&format!("\n  {:<32} {:>12} rows", table, rows));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Dialect;

    #[test]
    fn test_render_lists_tables() {
        let summary = EndpointSummary {
            descriptor: "sqlite:///tmp/app.db".to_string(),
            dialect: Dialect::Sqlite,
            tables: vec![("orders".to_string(), 2500), ("users".to_string(), 3)],
        };
        let out = render("Source", &summary);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Source: sqlite:///tmp/app.db [sqlite] (2 tables)");
        assert!(lines[1].starts_with("  orders"));
        assert!(lines[1].ends_with("2500 rows"));
        assert_eq!(lines.len(), 3);
    }
}
