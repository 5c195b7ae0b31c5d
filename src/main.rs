// ABOUTME: CLI entry point for db-copier
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Parser, Subcommand};
use db_copier::commands::{self, CopyOverrides};
use db_copier::config::CopyOptions;

#[derive(Parser)]
#[command(name = "db-copier")]
#[command(about = "Copy schema and data between PostgreSQL, MySQL, and SQLite databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy schema, data, indices, and sequences from source to destination
    Copy {
        /// TOML file with [source], [destination], and [options]
        #[arg(long, short = 'c')]
        config: String,
        /// Copy only these tables, in this order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
        /// Rows fetched and imported per page
        #[arg(long)]
        page_size: Option<u64>,
        /// Do not drop and recreate destination tables
        #[arg(long)]
        skip_schema: bool,
        /// Copy schema, indices, and sequences only
        #[arg(long)]
        skip_data: bool,
        /// Resume an interrupted copy from the destination row counts
        #[arg(long = "continue")]
        resume: bool,
        /// Empty destination tables before copying into them
        #[arg(long)]
        truncate_tables: bool,
        /// Do not draw progress bars
        #[arg(long, short = 'q')]
        quiet: bool,
    },
    /// List tables and row counts on both endpoints
    Info {
        #[arg(long, short = 'c')]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Copy {
            config,
            tables,
            page_size,
            skip_schema,
            skip_data,
            resume,
            truncate_tables,
            quiet,
        } => {
            let overrides = CopyOverrides {
                tables,
                page_size,
                options: CopyOptions {
                    skip_schema,
                    skip_data,
                    resume,
                    truncate_tables,
                },
                quiet,
            };
            commands::copy(&config, &overrides).await?;
            Ok(())
        }
        Commands::Info { config } => commands::info(&config).await,
    }
}
