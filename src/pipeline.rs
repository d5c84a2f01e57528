//! Pipeline orchestration
//!
//! Runs the steps in order against one DuckDB file: fetch into Bronze, build
//! Silver, build Gold. Each warehouse step opens its own connection and
//! closes it before the next step starts.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::bronze::{self, BronzeWriter, ConvertReport, FetchReport, RunSummary};
use crate::config::PipelineConfig;
use crate::error::{Error, Result, ResultExt};
use crate::gold::{self, GoldPaths, GoldReport, GOLD_EXPORT_SQL, GOLD_SQL};
use crate::http::HttpClient;
use crate::resources::Resource;
use crate::silver::{self, SilverReport, SILVER_SQL};
use crate::source::{BridgeSource, Extractor, HttpSource, RecordSource};
use crate::types::{Layer, SourceKind};
use crate::warehouse::Warehouse;

/// Statements each SQL script must contain
const SQL_REQUIREMENTS: &[(&str, &str, &[&str])] = &[
    (
        "01_silver_build.sql",
        SILVER_SQL,
        &[
            "CREATE SCHEMA",
            "CREATE OR REPLACE TABLE silver.accounts",
            "CREATE OR REPLACE TABLE silver.transactions",
            "CREATE OR REPLACE VIEW silver.qc_orphan_txn_accounts",
            "CREATE OR REPLACE VIEW silver.qc_missing_fields",
        ],
    ),
    (
        "02_gold_build.sql",
        GOLD_SQL,
        &[
            "CREATE SCHEMA",
            "CREATE OR REPLACE TABLE gold.dim_account",
            "CREATE OR REPLACE TABLE gold.fact_txn",
            "CREATE OR REPLACE VIEW gold.v_kpi_month",
            "CREATE OR REPLACE VIEW gold.v_pl_month",
            "CREATE OR REPLACE VIEW gold.v_bs_month",
            "CREATE OR REPLACE VIEW gold.v_account_detail",
        ],
    ),
    ("03_gold_export.sql", GOLD_EXPORT_SQL, &["COPY", "FORMAT PARQUET"]),
];

const CSV_SAMPLE_ROWS: usize = 5;

/// Timing of one warehouse step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    /// Layer the step built
    pub step: Layer,
    /// Wall-clock seconds
    pub seconds: f64,
}

/// Result of a Silver + Gold build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Bronze JSONL files found before the build
    pub bronze_files: usize,
    /// Silver summary
    pub silver: SilverReport,
    /// Gold summary
    pub gold: GoldReport,
    /// Step durations, in run order
    pub steps: Vec<StepTiming>,
}

/// Presence of one required statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlCheck {
    /// Script file name
    pub script: &'static str,
    /// Statement looked for
    pub statement: &'static str,
    /// Whether it was found
    pub found: bool,
}

/// Account-groups CSV summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvCheck {
    /// CSV path
    pub path: PathBuf,
    /// Whether the file exists
    pub present: bool,
    /// Header line
    pub header: Option<String>,
    /// Data rows (non-blank lines after the header)
    pub data_rows: usize,
    /// First data rows
    pub sample: Vec<String>,
}

/// Result of `Pipeline::validate`
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Required statements per script
    pub sql_checks: Vec<SqlCheck>,
    /// Account-groups CSV
    pub account_groups: CsvCheck,
    /// `gold.dim_account` rows from the in-memory run
    pub dim_account_rows: usize,
    /// `gold.v_kpi_month` rows from the in-memory run
    pub kpi_months: usize,
    /// Every check passed
    pub passed: bool,
}

/// The Bronze → Silver → Gold pipeline
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Effective configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // Bronze
    // ========================================================================

    /// Build the configured record source
    pub fn create_source(&self) -> Result<Box<dyn RecordSource>> {
        match self.config.source {
            SourceKind::Http => {
                let api = &self.config.api;
                let auth = api.auth.resolve()?;
                info!("Using Payday API at {} ({} auth)", api.base_url, auth.kind());
                let client = HttpClient::with_auth(api.http.client_config(&api.base_url), auth)?;
                Ok(Box::new(HttpSource::new(client)))
            }
            SourceKind::Bridge => {
                let fetch = &self.config.fetch;
                let mut bridge = BridgeSource::new(fetch.bridge_command.clone())?;
                if let Some(dir) = &fetch.bridge_dir {
                    bridge = bridge.with_working_dir(dir);
                }
                bridge.check_ready()?;
                info!("Using MCP bridge: {}", fetch.bridge_command.join(" "));
                Ok(Box::new(bridge))
            }
        }
    }

    /// Fetch every configured resource into a new Bronze snapshot
    pub async fn fetch(&self) -> Result<RunSummary> {
        self.config.validate()?;
        let source = self.create_source()?;
        let writer = BronzeWriter::new(&self.config.paths.bronze_dir);
        Ok(self.fetch_with(source.as_ref(), &writer).await)
    }

    /// Fetch every configured resource from `source`, one at a time
    ///
    /// Unknown resources are skipped. A failing resource is recorded in its
    /// report and the remaining resources are still fetched.
    pub async fn fetch_with(&self, source: &dyn RecordSource, writer: &BronzeWriter) -> RunSummary {
        let fetch = &self.config.fetch;
        let extractor = Extractor::new(source, fetch.page_size, fetch.max_pages, fetch.statement_from);

        if self.config.resources.is_empty() {
            warn!("No resources configured. Set PAYDAY_RESOURCES or `resources` in the config file");
        }

        let mut reports = Vec::new();
        for name in &self.config.resources {
            let Some(resource) = Resource::lookup(name) else {
                warn!("Unknown resource: {}", name);
                continue;
            };

            info!("Fetching {}", resource.name);
            let report = match fetch_resource(&extractor, source, writer, resource).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Fetch {} failed: {}", resource.name, e);
                    FetchReport {
                        endpoint: source.endpoint(resource).ok(),
                        ..FetchReport::failed(resource.name, e.to_string())
                    }
                }
            };
            reports.push(report);
        }

        let summary = RunSummary::new(writer.snapshot(), writer.root(), reports);
        summary.log();
        summary
    }

    /// Convert the latest Bronze snapshot of every resource to Parquet
    pub fn convert(&self) -> Result<Vec<ConvertReport>> {
        let warehouse = Warehouse::in_memory()?;
        let result = bronze::convert_latest(&self.config.paths.bronze_dir, &warehouse);
        warehouse.close()?;
        result
    }

    // ========================================================================
    // Silver + Gold
    // ========================================================================

    /// Build Silver and then Gold into the warehouse file, exporting Gold
    pub fn build(&self) -> Result<BuildReport> {
        let paths = &self.config.paths;

        let bronze_files = count_bronze_files(&paths.bronze_dir)?;
        if bronze_files == 0 {
            warn!("No Bronze data found in {}", paths.bronze_dir.display());
            warn!("Pipeline will build with empty tables for validation");
        } else {
            info!("Found {} Bronze JSONL files", bronze_files);
        }

        let mut steps = Vec::new();

        let policy = self.config.quality;
        let (silver, elapsed) = self.run_step(Layer::Silver, |wh| {
            silver::build(wh, &paths.bronze_dir, policy)
        })?;
        steps.push(StepTiming::new(Layer::Silver, elapsed));

        let gold_paths = GoldPaths {
            account_groups: paths.account_groups.clone(),
            export_dir: Some(paths.gold_dir.clone()),
        };
        let (gold, elapsed) = self.run_step(Layer::Gold, |wh| gold::build(wh, &gold_paths))?;
        steps.push(StepTiming::new(Layer::Gold, elapsed));

        info!("Pipeline complete: Silver tables typed and deduplicated, Gold views built");
        log_usage();

        Ok(BuildReport {
            bronze_files,
            silver,
            gold,
            steps,
        })
    }

    fn run_step<T>(
        &self,
        layer: Layer,
        step: impl FnOnce(&Warehouse) -> Result<T>,
    ) -> Result<(T, Duration)> {
        info!("=== {} ===", layer);
        let started = Instant::now();

        let result = Warehouse::open(&self.config.paths.warehouse).and_then(|warehouse| {
            let outcome = step(&warehouse);
            let closed = warehouse.close();
            let value = outcome?;
            closed?;
            Ok(value)
        });

        let elapsed = started.elapsed();
        match result {
            Ok(value) => {
                info!("{} completed in {:.1}s", layer, elapsed.as_secs_f64());
                Ok((value, elapsed))
            }
            Err(e) => {
                error!("{} failed after {:.1}s: {}", layer, elapsed.as_secs_f64(), e);
                Err(Error::step(layer.to_string(), e))
            }
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check the SQL assets and account groups, then build in memory
    pub fn validate(&self) -> Result<ValidationReport> {
        let sql_checks = check_sql();
        for check in &sql_checks {
            if check.found {
                info!("[OK] {}: {}", check.script, check.statement);
            } else {
                warn!("[WARN] {}: {} not found", check.script, check.statement);
            }
        }

        let account_groups = check_account_groups(&self.config.paths.account_groups)?;
        account_groups.log();

        let mut report = ValidationReport {
            passed: account_groups.present && sql_checks.iter().all(|c| c.found),
            sql_checks,
            account_groups,
            dim_account_rows: 0,
            kpi_months: 0,
        };
        if !report.account_groups.present {
            return Ok(report);
        }

        info!("Building Silver and Gold in memory");
        let warehouse = Warehouse::in_memory()?;
        let built = silver::build(
            &warehouse,
            &self.config.paths.bronze_dir,
            self.config.quality,
        )
        .map_err(|e| Error::step(Layer::Silver.to_string(), e))
        .and_then(|_| {
            let paths = GoldPaths {
                account_groups: self.config.paths.account_groups.clone(),
                export_dir: None,
            };
            gold::build(&warehouse, &paths).map_err(|e| Error::step(Layer::Gold.to_string(), e))
        });
        warehouse.close()?;

        let gold = built?;
        report.dim_account_rows = gold.dim_account_rows;
        report.kpi_months = gold.kpi_months;
        info!(
            "In-memory pipeline complete: {} accounts, {} KPI months",
            gold.dim_account_rows, gold.kpi_months
        );
        Ok(report)
    }
}

impl StepTiming {
    fn new(step: Layer, elapsed: Duration) -> Self {
        Self {
            step,
            seconds: elapsed.as_secs_f64(),
        }
    }
}

impl CsvCheck {
    fn log(&self) {
        if !self.present {
            warn!("[ERR] {}: NOT FOUND", self.path.display());
            return;
        }
        info!("[OK] {}: {} data rows", self.path.display(), self.data_rows);
        if let Some(header) = &self.header {
            info!("Header: {}", header);
        }
        for (i, row) in self.sample.iter().enumerate() {
            info!("Row {}: {}", i + 1, row);
        }
        if self.data_rows > self.sample.len() {
            info!("... and {} more rows", self.data_rows - self.sample.len());
        }
    }
}

async fn fetch_resource(
    extractor: &Extractor<'_>,
    source: &dyn RecordSource,
    writer: &BronzeWriter,
    resource: &Resource,
) -> Result<FetchReport> {
    let endpoint = source.endpoint(resource)?;
    let extraction = extractor.fetch_all(resource).await?;
    let pages_fetched = extraction.pages_fetched;
    let written = writer.write_snapshot(resource.name, extraction.records, source.source_tag())?;

    let mut report = FetchReport {
        resource: resource.name.to_string(),
        pages_fetched,
        endpoint: Some(endpoint),
        ..FetchReport::default()
    };
    if let Some(written) = written {
        report.count = written.count;
        report.jsonl = Some(written.jsonl);
        report.parquet = written.parquet;
    }
    Ok(report)
}

fn count_bronze_files(bronze_dir: &Path) -> Result<usize> {
    let mut total = 0;
    for dir in bronze::resource_dirs(bronze_dir)? {
        total += bronze::snapshots(&dir)?.len();
    }
    Ok(total)
}

/// Look for the required statements in the embedded SQL scripts
pub fn check_sql() -> Vec<SqlCheck> {
    SQL_REQUIREMENTS
        .iter()
        .flat_map(|(script, sql, statements)| {
            statements.iter().map(move |statement| SqlCheck {
                script: *script,
                statement: *statement,
                found: sql.contains(*statement),
            })
        })
        .collect()
}

/// Summarise the account-groups CSV
pub fn check_account_groups(path: &Path) -> Result<CsvCheck> {
    if !path.is_file() {
        return Ok(CsvCheck {
            path: path.to_path_buf(),
            ..CsvCheck::default()
        });
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    let header = lines.next().map(str::to_string);
    let rows: Vec<&str> = lines.collect();

    Ok(CsvCheck {
        path: path.to_path_buf(),
        present: true,
        header,
        data_rows: rows.len(),
        sample: rows
            .iter()
            .take(CSV_SAMPLE_ROWS)
            .map(|r| (*r).to_string())
            .collect(),
    })
}

fn log_usage() {
    info!("Export KPIs:     payday-etl export --view gold.v_kpi_month");
    info!("Export P&L:      payday-etl export --view gold.v_pl_month");
    info!("Export accounts: payday-etl export --view gold.v_account_detail");
}
