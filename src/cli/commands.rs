//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::export::DEFAULT_LIMIT;
use crate::types::SourceKind;

/// Payday Bronze/Silver/Gold pipeline
#[derive(Parser, Debug)]
#[command(name = "payday-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data root (Bronze and Gold directories live below it)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// DuckDB warehouse file
    #[arg(short, long, global = true)]
    pub warehouse: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch resources into a new Bronze snapshot
    Fetch {
        /// Resources to fetch (comma-separated, overrides PAYDAY_RESOURCES)
        #[arg(long)]
        resources: Option<String>,

        /// Record source
        #[arg(long, value_enum)]
        source: Option<SourceKind>,
    },

    /// Convert the latest Bronze snapshots to `<resource>_latest.parquet`
    Convert,

    /// Build Silver and Gold into the warehouse and export Gold
    Build,

    /// Check SQL assets and account groups, then build in memory
    Validate,

    /// Export a view as JSON
    Export {
        /// View or table, e.g. gold.v_kpi_month
        #[arg(long)]
        view: String,

        /// WHERE condition
        #[arg(long = "where")]
        where_clause: Option<String>,

        /// ORDER BY expression (default: first column descending)
        #[arg(long)]
        order: Option<String>,

        /// Maximum rows
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Output file, or '-' for stdout
        #[arg(short, long, default_value = "-")]
        out: String,
    },

    /// Fetch, then build
    Run {
        /// Resources to fetch (comma-separated, overrides PAYDAY_RESOURCES)
        #[arg(long)]
        resources: Option<String>,

        /// Record source
        #[arg(long, value_enum)]
        source: Option<SourceKind>,
    },

    /// List known resources
    Resources,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::parse_from([
            "payday-etl",
            "--warehouse",
            "/tmp/wh.duckdb",
            "export",
            "--view",
            "gold.v_kpi_month",
            "--where",
            "revenue > 0",
        ]);
        assert_eq!(cli.warehouse, Some(PathBuf::from("/tmp/wh.duckdb")));
        match cli.command {
            Commands::Export {
                view,
                where_clause,
                limit,
                out,
                ..
            } => {
                assert_eq!(view, "gold.v_kpi_month");
                assert_eq!(where_clause.as_deref(), Some("revenue > 0"));
                assert_eq!(limit, 2000);
                assert_eq!(out, "-");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_fetch_with_global_flags_after() {
        let cli = Cli::parse_from([
            "payday-etl",
            "fetch",
            "--source",
            "bridge",
            "--resources",
            "accounts,invoices",
            "-v",
        ]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Fetch {
                source: Some(SourceKind::Bridge),
                ..
            }
        ));
    }
}
