// ABOUTME: Copy command: runs a full or partial database copy from a config file
// ABOUTME: Merges CLI overrides into the file options before handing off to DbCopier

use crate::config::{load_config_from_file, CopierConfig, CopyOptions};
use crate::migration::{DbCopier, TransferReport};
use crate::progress::{ConsoleProgress, ProgressSink, SilentProgress};
use anyhow::Result;

/// Options given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct CopyOverrides {
    pub tables: Option<Vec<String>>,
    pub page_size: Option<u64>,
    pub options: CopyOptions,
    pub quiet: bool,
}

/// Apply CLI overrides on top of a parsed configuration.
///
/// Boolean options are switched on by either source; table list and page
/// size from the command line replace the file values.
pub fn merge_overrides(mut config: CopierConfig, overrides: &CopyOverrides) -> CopierConfig {
    if let Some(tables) = &overrides.tables {
        config.tables = Some(tables.clone());
    }
    if let Some(page_size) = overrides.page_size {
        config.page_size = page_size;
    }

    let cli = &overrides.options;
    let file = &mut config.options;
    file.skip_schema |= cli.skip_schema;
    file.skip_data |= cli.skip_data;
    file.resume |= cli.resume;
    file.truncate_tables |= cli.truncate_tables;
    config
}

/// Copy tables from the configured source to the configured destination
///
/// # Arguments
///
/// * `config_path` - TOML run configuration with `[source]` and `[destination]`
/// * `overrides` - Command line options layered over the file
///
/// # Returns
///
/// The report of rows copied per table and total elapsed time.
///
/// # Errors
///
/// This function will return an error if:
/// - The config file cannot be read or is invalid
/// - Either endpoint cannot be reached
/// - Any phase fails (DDL, oversized data, resume mismatch, driver errors)
pub async fn copy(config_path: &str, overrides: &CopyOverrides) -> Result<TransferReport> {
    let config = merge_overrides(load_config_from_file(config_path)?, overrides);
    config.validate()?;

    let progress: Box<dyn ProgressSink> = if overrides.quiet {
        Box::new(SilentProgress::default())
    } else {
        Box::new(ConsoleProgress::new())
    };

    let mut copier = DbCopier::connect(&config).await?.with_progress(progress);
    copier
        .copy(config.tables.as_deref(), &config.options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const RAW: &str = r#"
        tables = ["orders"]
        page_size = 500

        [source]
        adapter = "sqlite"
        database = "/tmp/source.db"

        [destination]
        adapter = "sqlite"
        database = "/tmp/destination.db"

        [options]
        truncate_tables = true
    "#;

    #[test]
    fn test_cli_overrides_win() {
        let config = parse_config(RAW).unwrap();
        let overrides = CopyOverrides {
            tables: Some(vec!["customers".to_string(), "orders".to_string()]),
            page_size: Some(2000),
            options: CopyOptions {
                resume: true,
                ..Default::default()
            },
            quiet: true,
        };

        let merged = merge_overrides(config, &overrides);
        assert_eq!(
            merged.tables,
            Some(vec!["customers".to_string(), "orders".to_string()])
        );
        assert_eq!(merged.page_size, 2000);
        assert!(merged.options.resume);
        assert!(merged.options.truncate_tables);
        assert!(!merged.options.runs_schema());
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let config = parse_config(RAW).unwrap();
        let merged = merge_overrides(config.clone(), &CopyOverrides::default());
        assert_eq!(merged.tables, config.tables);
        assert_eq!(merged.page_size, 500);
        assert_eq!(merged.options, config.options);
    }
}
