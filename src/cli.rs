//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvPriceSource, load_matrix_csv};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::inflation_file_adapter::InflationFile;
use crate::domain::asset::{AssetSpec, parse_codes};
use crate::domain::config_validation::{validate_config, validate_source_config};
use crate::domain::error::MelaoError;
use crate::domain::inflation::InflationTable;
use crate::domain::ingestion::{AssetStatus, refresh};
use crate::domain::metrics::{LOOKBACK_PERIODS, RESULT_HEADER, compute_metrics_with};
use crate::domain::price_matrix::PriceMatrix;
use crate::domain::result_table::{Bounds, FilterCriteria, ResultTable, SortColumn};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_source_port::PriceSource;
use crate::ports::price_store_port::PriceStore;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "melao", about = "Price store and Melão Index metrics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store schema and seed the asset catalog
    Init {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Fetch new prices for the configured assets
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated codes, overriding [ingest] codes
        #[arg(long)]
        code: Option<String>,
    },
    /// Compute metrics for every asset and lookback period
    Compute {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Wide price CSV to use instead of the store
        #[arg(long)]
        matrix: Option<PathBuf>,
        /// Export the displayed rows as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        sort: Option<SortColumn>,
        #[arg(long)]
        ascending: bool,
        /// Print why assets or periods produced no row
        #[arg(long)]
        show_skipped: bool,
    },
    /// Show stored data range per asset
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
    /// List catalogued assets
    ListAssets {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show or update cumulative inflation per period
    Inflation {
        #[arg(short, long)]
        config: PathBuf,
        /// PERIOD=PERCENT, e.g. 10=45.5; saved to [inflation] path
        #[arg(long = "set", value_name = "PERIOD=PERCENT")]
        set: Vec<String>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub min_melao: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub max_melao: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub min_hurst: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub max_hurst: Option<f64>,
    /// Annual return, percent
    #[arg(long, allow_negative_numbers = true)]
    pub min_return: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub max_return: Option<f64>,
    /// Maximum drawdown, percent
    #[arg(long)]
    pub min_mdd: Option<f64>,
    #[arg(long)]
    pub max_mdd: Option<f64>,
    /// Case-insensitive substring of the asset code
    #[arg(long)]
    pub asset: Option<String>,
    /// Comma-separated periods in years
    #[arg(long, value_delimiter = ',')]
    pub periods: Vec<u32>,
}

impl FilterArgs {
    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            melao_index: Bounds::new(self.min_melao, self.max_melao),
            hurst: Bounds::new(self.min_hurst, self.max_hurst),
            annual_return_pct: Bounds::new(self.min_return, self.max_return),
            mdd_pct: Bounds::new(self.min_mdd, self.max_mdd),
            asset_contains: self.asset.clone().filter(|s| !s.trim().is_empty()),
            periods: if self.periods.is_empty() {
                None
            } else {
                Some(self.periods.iter().copied().collect::<BTreeSet<u32>>())
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComputeOptions {
    pub criteria: FilterCriteria,
    pub sort: Option<SortColumn>,
    pub ascending: bool,
    pub output: Option<PathBuf>,
    pub show_skipped: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Init { config } => run_init(&config),
        Command::Ingest { config, code } => run_ingest(&config, code.as_deref()),
        Command::Compute {
            config,
            matrix,
            output,
            filter,
            sort,
            ascending,
            show_skipped,
        } => {
            let options = ComputeOptions {
                criteria: filter.to_criteria(),
                sort,
                ascending,
                output,
                show_skipped,
            };
            run_compute(config.as_deref(), matrix.as_deref(), options)
        }
        Command::Info { config, code } => run_info(&config, code.as_deref()),
        Command::ListAssets { config } => run_list_assets(&config),
        Command::Inflation { config, set } => run_inflation(&config, &set),
    }
}

fn report_error(err: MelaoError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = MelaoError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        report_error(err)
    })
}

/// Load and validate a config file for a command that uses the store.
fn load_store_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let config = load_config(path)?;
    validate_config(&config).map_err(report_error)?;
    Ok(config)
}

#[cfg(feature = "sqlite")]
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn PriceStore>, MelaoError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
pub fn open_store(_config: &dyn ConfigPort) -> Result<Box<dyn PriceStore>, MelaoError> {
    Err(MelaoError::Database {
        reason: "melao was built without the sqlite feature".into(),
    })
}

pub fn build_source(config: &dyn ConfigPort) -> Result<Box<dyn PriceSource>, MelaoError> {
    let kind = config
        .get_string("source", "kind")
        .unwrap_or_else(|| "csv".to_string())
        .trim()
        .to_lowercase();

    match kind.as_str() {
        "csv" => {
            let dir = config
                .get_string("source", "csv_dir")
                .ok_or_else(|| MelaoError::ConfigMissing {
                    section: "source".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvPriceSource::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "nasdaq")]
        "nasdaq" => {
            use crate::adapters::nasdaq_adapter::NasdaqSource;
            Ok(Box::new(NasdaqSource::from_config(config)?))
        }
        #[cfg(not(feature = "nasdaq"))]
        "nasdaq" => Err(MelaoError::ConfigInvalid {
            section: "source".into(),
            key: "kind".into(),
            reason: "melao was built without the nasdaq feature".into(),
        }),
        other => Err(MelaoError::ConfigInvalid {
            section: "source".into(),
            key: "kind".into(),
            reason: format!("unknown source '{other}'"),
        }),
    }
}

/// `[assets] CODE = Display Name` entries.
pub fn catalog_specs(config: &dyn ConfigPort) -> Vec<AssetSpec> {
    config
        .keys("assets")
        .iter()
        .map(|code| AssetSpec::new(code, config.get_string("assets", code).as_deref()))
        .collect()
}

/// Codes from the override or `[ingest] codes`. `None` means "every catalogued asset".
pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Option<Vec<String>>, MelaoError> {
    let (list, key) = match code_override {
        Some(list) => (list.to_string(), "--code"),
        None => match config.get_string("ingest", "codes") {
            Some(list) => (list, "codes"),
            None => return Ok(None),
        },
    };

    parse_codes(&list)
        .map(Some)
        .map_err(|e| MelaoError::ConfigInvalid {
            section: "ingest".into(),
            key: key.into(),
            reason: e.to_string(),
        })
}

/// Inflation from `[inflation] path` (JSON), overlaid with any numeric
/// `[inflation]` keys. Values are cumulative percentages.
pub fn build_inflation_table(config: &dyn ConfigPort) -> Result<InflationTable, MelaoError> {
    let mut table = match config.get_string("inflation", "path") {
        Some(path) => InflationFile::new(path).load()?,
        None => InflationTable::new(),
    };

    for key in config.keys("inflation") {
        if key == "path" {
            continue;
        }
        let period = key
            .parse::<u32>()
            .map_err(|_| MelaoError::ConfigInvalid {
                section: "inflation".into(),
                key: key.clone(),
                reason: "key must be a period in whole years".into(),
            })?;
        table.set(period, config.get_double("inflation", &key, 0.0) / 100.0);
    }

    Ok(table)
}

/// Parse `PERIOD=PERCENT`.
pub fn parse_inflation_assignment(text: &str) -> Result<(u32, f64), MelaoError> {
    let invalid = || MelaoError::InvalidData {
        reason: format!("expected PERIOD=PERCENT, got '{text}'"),
    };
    let (period, pct) = text.split_once('=').ok_or_else(invalid)?;
    let period = period
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(invalid)?;
    let pct = pct
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > -100.0)
        .ok_or_else(invalid)?;
    Ok((period, pct))
}

fn run_init(config_path: &Path) -> ExitCode {
    let config = match load_store_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return report_error(e),
    };
    run_init_pipeline(store.as_ref(), &catalog_specs(&config))
}

pub fn run_init_pipeline(store: &dyn PriceStore, specs: &[AssetSpec]) -> ExitCode {
    match store.seed_catalog(specs) {
        Ok(added) => {
            eprintln!(
                "Store ready: {} catalog entries, {} newly registered",
                specs.len(),
                added
            );
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

fn run_ingest(config_path: &Path, code_override: Option<&str>) -> ExitCode {
    let config = match load_store_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_source_config(&config) {
        return report_error(e);
    }

    let codes = match resolve_codes(code_override, &config) {
        Ok(c) => c,
        Err(e) => return report_error(e),
    };
    let source = match build_source(&config) {
        Ok(s) => s,
        Err(e) => return report_error(e),
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return report_error(e),
    };
    let register_unknown = config.get_bool("ingest", "register_unknown", true);

    run_ingest_pipeline(store.as_ref(), source.as_ref(), codes, register_unknown)
}

pub fn run_ingest_pipeline(
    store: &dyn PriceStore,
    source: &dyn PriceSource,
    codes: Option<Vec<String>>,
    register_unknown: bool,
) -> ExitCode {
    let codes = match codes {
        Some(c) => c,
        None => match store.list_assets() {
            Ok(assets) => assets.into_iter().map(|a| a.code).collect(),
            Err(e) => return report_error(e),
        },
    };
    if codes.is_empty() {
        eprintln!("error: no codes configured and the asset catalog is empty");
        return ExitCode::from(2);
    }

    eprintln!("Ingesting {} assets...", codes.len());
    let summary = match refresh(&codes, source, store, register_unknown) {
        Ok(s) => s,
        Err(e) => return report_error(e),
    };

    for (code, status) in &summary.statuses {
        match status {
            AssetStatus::Updated { inserted } => eprintln!("  {code}: {inserted} new prices"),
            AssetStatus::Failed { reason } => eprintln!("  {code}: failed ({reason})"),
        }
    }

    let failed = summary.failures().count();
    eprintln!(
        "\n{} prices inserted, {} of {} assets failed",
        summary.inserted_total(),
        failed,
        summary.statuses.len()
    );

    if failed == summary.statuses.len() {
        ExitCode::from(4)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_compute(
    config_path: Option<&Path>,
    matrix_path: Option<&Path>,
    mut options: ComputeOptions,
) -> ExitCode {
    let config = match config_path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            match load_config(path) {
                Ok(c) => Some(c),
                Err(code) => return code,
            }
        }
        None => None,
    };

    let inflation = match &config {
        Some(c) => match build_inflation_table(c) {
            Ok(t) => t,
            Err(e) => return report_error(e),
        },
        None => InflationTable::new(),
    };

    if options.output.is_none() {
        options.output = config
            .as_ref()
            .and_then(|c| c.get_string("report", "output"))
            .map(PathBuf::from);
    }

    let matrix = match (matrix_path, &config) {
        (Some(path), _) => {
            eprintln!("Loading price matrix from {}", path.display());
            load_matrix_csv(path)
        }
        (None, Some(c)) => validate_config(c)
            .and_then(|()| open_store(c))
            .and_then(|store| store.load_matrix()),
        (None, None) => {
            eprintln!("error: --config or --matrix is required for compute");
            return ExitCode::from(1);
        }
    };
    let matrix = match matrix {
        Ok(m) => m,
        Err(e) => return report_error(e),
    };

    run_compute_pipeline(&matrix, &inflation, &options)
}

pub fn run_compute_pipeline(
    matrix: &PriceMatrix,
    inflation: &InflationTable,
    options: &ComputeOptions,
) -> ExitCode {
    let Some(data_final) = matrix.final_date() else {
        eprintln!("error: no price data to compute");
        return ExitCode::from(4);
    };

    eprintln!(
        "Computing metrics: {} assets, {} dates, final date {}",
        matrix.asset_count(),
        matrix.dates().len(),
        data_final
    );

    let report = compute_metrics_with(matrix, inflation, |progress| {
        eprintln!(
            "  [{}/{}] {}",
            progress.position, progress.total, progress.code
        );
        ControlFlow::Continue(())
    });

    if options.show_skipped {
        for skipped in &report.skipped {
            match skipped.period_years {
                Some(p) => eprintln!("  skipped {} ({}y): {}", skipped.asset, p, skipped.reason),
                None => eprintln!("  skipped {}: {}", skipped.asset, skipped.reason),
            }
        }
    }

    let mut table = report.table.filter(&options.criteria);
    if let Some(column) = options.sort {
        table = table.sort_by(column, !options.ascending);
    }

    print!("{}", render_table(&table));
    eprintln!("\n{} of {} rows shown", table.len(), report.table.len());

    if let Some(output) = &options.output {
        if let Err(e) = CsvReportAdapter.write(&table, &output.to_string_lossy()) {
            return report_error(e);
        }
        eprintln!("Results written to: {}", output.display());
    }

    ExitCode::SUCCESS
}

/// Fixed-width text rendering: asset and period left-aligned, numbers right-aligned.
pub fn render_table(table: &ResultTable) -> String {
    let records: Vec<[String; 10]> = table.records().collect();

    let mut widths = RESULT_HEADER.map(|h| h.chars().count());
    for record in &records {
        for (width, cell) in widths.iter_mut().zip(record) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                if i < 2 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };

    push_line(&RESULT_HEADER);
    for record in &records {
        let cells: Vec<&str> = record.iter().map(String::as_str).collect();
        push_line(&cells);
    }
    out
}

fn run_info(config_path: &Path, code_override: Option<&str>) -> ExitCode {
    let config = match load_store_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return report_error(e),
    };

    let codes = match resolve_codes(code_override, &config) {
        Ok(Some(c)) => c,
        Ok(None) => match store.list_assets() {
            Ok(assets) => assets.into_iter().map(|a| a.code).collect(),
            Err(e) => return report_error(e),
        },
        Err(e) => return report_error(e),
    };

    for code in &codes {
        match store.data_range(code) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} prices, {} to {}", code, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", code),
            Err(e) => return report_error(e),
        }
    }
    ExitCode::SUCCESS
}

fn run_list_assets(config_path: &Path) -> ExitCode {
    let config = match load_store_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let assets = match open_store(&config).and_then(|store| store.list_assets()) {
        Ok(a) => a,
        Err(e) => return report_error(e),
    };

    if assets.is_empty() {
        eprintln!("No assets catalogued");
    }
    for asset in &assets {
        println!(
            "{}\t{}\t{}",
            asset.id,
            asset.code,
            asset.name.as_deref().unwrap_or("")
        );
    }
    ExitCode::SUCCESS
}

fn run_inflation(config_path: &Path, assignments: &[String]) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if !assignments.is_empty() {
        let Some(path) = config.get_string("inflation", "path") else {
            return report_error(MelaoError::ConfigMissing {
                section: "inflation".into(),
                key: "path".into(),
            });
        };
        let file = InflationFile::new(path);
        let mut stored = match file.load() {
            Ok(t) => t,
            Err(e) => return report_error(e),
        };
        for text in assignments {
            match parse_inflation_assignment(text) {
                Ok((period, pct)) => stored.set(period, pct / 100.0),
                Err(e) => return report_error(e),
            }
        }
        if let Err(e) = file.save(&stored) {
            return report_error(e);
        }
        eprintln!("Inflation saved to {}", file.path().display());
    }

    let table = match build_inflation_table(&config) {
        Ok(t) => t,
        Err(e) => return report_error(e),
    };

    println!("{:>6}  {:>12}  {:>10}", "Period", "Cumulative %", "Annual %");
    for period in LOOKBACK_PERIODS {
        println!(
            "{:>6}  {:>12.2}  {:>10.2}",
            period,
            table.get(period) * 100.0,
            table.annualized(period) * 100.0
        );
    }
    ExitCode::SUCCESS
}
