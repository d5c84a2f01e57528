//! CLI runner - executes commands

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::cli::commands::{Cli, Commands};
use crate::config::{parse_resource_list, PipelineConfig};
use crate::error::{Error, Result};
use crate::export::{self, ExportRequest};
use crate::pipeline::Pipeline;
use crate::resources::RESOURCES;
use crate::types::SourceKind;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Fetch { resources, source } => {
                let pipeline = self.pipeline(resources.as_deref(), *source)?;
                let summary = pipeline.fetch().await?;
                print_json(&summary)
            }
            Commands::Convert => {
                let reports = self.pipeline(None, None)?.convert()?;
                print_json(&reports)
            }
            Commands::Build => {
                let report = self.pipeline(None, None)?.build()?;
                print_json(&report)
            }
            Commands::Validate => {
                let report = self.pipeline(None, None)?.validate()?;
                print_json(&report)?;
                if report.passed {
                    Ok(())
                } else {
                    Err(Error::Other(
                        "Validation failed: missing SQL statements or account groups".to_string(),
                    ))
                }
            }
            Commands::Export {
                view,
                where_clause,
                order,
                limit,
                out,
            } => {
                let config = self.load_config()?;
                let request = ExportRequest {
                    view: view.clone(),
                    where_clause: where_clause.clone(),
                    order: order.clone(),
                    limit: *limit,
                    out: out.clone(),
                };
                export::export(&config.paths.warehouse, &request).map(|_| ())
            }
            Commands::Run { resources, source } => {
                let pipeline = self.pipeline(resources.as_deref(), *source)?;
                let fetched = pipeline.fetch().await?;
                if fetched.failures().count() > 0 {
                    warn!("Some resources failed; building with what was fetched");
                }
                let built = pipeline.build()?;
                print_json(&json!({ "fetch": fetched, "build": built }))
            }
            Commands::Resources => self.list_resources(),
        }
    }

    /// Load config: file, environment, then global CLI flags
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.cli.config.as_deref())?;
        if let Some(dir) = &self.cli.data_dir {
            config.paths.rebase(dir);
        }
        if let Some(path) = &self.cli.warehouse {
            config.paths.warehouse.clone_from(path);
        }
        Ok(config)
    }

    fn pipeline(&self, resources: Option<&str>, source: Option<SourceKind>) -> Result<Pipeline> {
        let mut config = self.load_config()?;
        if let Some(list) = resources {
            config.resources = parse_resource_list(list);
        }
        if let Some(source) = source {
            config.source = source;
        }
        Ok(Pipeline::new(config))
    }

    fn list_resources(&self) -> Result<()> {
        let resources: Vec<Value> = RESOURCES
            .iter()
            .map(|r| {
                json!({
                    "name": r.name,
                    "route": r.route,
                    "tool": r.tool,
                    "strategy": r.strategy,
                })
            })
            .collect();
        print_json(&resources)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
