//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::csv_trade_adapter::CsvTradeAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::calendar::{parse_iso_date, shift_trading_days};
use crate::domain::chart::{chart_lines, ValueMode};
use crate::domain::compute::{ComputeOptions, ComputedSeries, DEFAULT_ANCHOR_TICKER};
use crate::domain::config_validation::validate_config;
use crate::domain::error::ShadowfolioError;
use crate::domain::pipeline::{
    backfill_lead, compute_skipping_failed, drop_ticker_events, plan_fetch_windows,
};
use crate::domain::price::{
    get_price_at_or_before, resolve_date_by_anchor, PriceBasis, PriceSeries,
    DEFAULT_MAX_BACK_TRADING_DAYS,
};
use crate::domain::split::{normalize_buy_events_by_splits, SplitEvent};
use crate::domain::trace::DayTrace;
use crate::domain::trade::TradeEvent;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;
use crate::ports::trade_port::TradePort;

#[derive(Parser, Debug)]
#[command(
    name = "shadowfolio",
    about = "Compare a trade history against a synthetic benchmark"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Value the portfolio and benchmark and write the series
    Compute {
        #[arg(short, long)]
        config: PathBuf,
        /// Write per-day traces here (overrides [output] trace)
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Write the series here (overrides [output] series)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Look up the price used for a ticker on a date
    Price {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        date: String,
    },
    /// Resolve a trade date against the anchor calendar
    ResolveDate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format {other:?} (expected csv or json)")),
        }
    }
}

/// Everything a run needs, with paths already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub buys_path: PathBuf,
    pub sells_path: Option<PathBuf>,
    pub prices_dir: PathBuf,
    pub splits_path: Option<PathBuf>,
    pub options: ComputeOptions,
    pub price_basis: PriceBasis,
    pub apply_splits: bool,
    pub buy_only: bool,
    pub skip_failed_tickers: bool,
    pub format: OutputFormat,
    pub series_path: PathBuf,
    pub trace_path: Option<PathBuf>,
    pub value_mode: ValueMode,
}

/// Outcome of the load, normalize and compute stages.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub series: ComputedSeries,
    pub traces: Vec<DayTrace>,
    /// Tickers removed because they could not be fetched or valued.
    pub dropped: Vec<String>,
    pub events_used: usize,
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Dispatch a parsed command. Errors are returned unprinted.
pub fn execute(cli: Cli) -> Result<(), ShadowfolioError> {
    match cli.command {
        Command::Compute {
            config,
            trace,
            output,
        } => run_compute(&config, trace, output),
        Command::Validate { config } => run_validate(&config),
        Command::Price {
            config,
            ticker,
            date,
        } => run_price(&config, &ticker, &date),
        Command::ResolveDate { config, date } => run_resolve_date(&config, &date),
    }
}

fn base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Relative config paths are taken relative to the config file.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn parse_key<T>(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<T, ShadowfolioError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match adapter.get_string(section, key) {
        Some(raw) => raw
            .parse()
            .map_err(|reason| ShadowfolioError::ConfigInvalid {
                section: section.into(),
                key: key.into(),
                reason,
            }),
        None => Ok(T::default()),
    }
}

pub fn build_run_config(adapter: &dyn ConfigPort, base: &Path) -> Result<RunConfig, ShadowfolioError> {
    let required = |key: &str| {
        adapter
            .get_string("data", key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ShadowfolioError::ConfigMissing {
                section: "data".into(),
                key: key.into(),
            })
    };
    let optional = |section: &str, key: &str| {
        adapter
            .get_string(section, key)
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_path(base, &s))
    };

    let max_back = adapter.get_int(
        "compute",
        "max_back_trading_days",
        DEFAULT_MAX_BACK_TRADING_DAYS as i64,
    );
    let max_back_trading_days =
        u32::try_from(max_back).map_err(|_| ShadowfolioError::ConfigInvalid {
            section: "compute".into(),
            key: "max_back_trading_days".into(),
            reason: format!("must not be negative, got {max_back}"),
        })?;
    let anchor_ticker = adapter
        .get_string("compute", "anchor_ticker")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_ANCHOR_TICKER.to_string());

    let format: OutputFormat = parse_key(adapter, "output", "format")?;
    let default_series = match format {
        OutputFormat::Csv => "series.csv",
        OutputFormat::Json => "series.json",
    };

    Ok(RunConfig {
        buys_path: resolve_path(base, &required("buys")?),
        sells_path: optional("data", "sells"),
        prices_dir: resolve_path(base, &required("prices_dir")?),
        splits_path: optional("data", "splits"),
        options: ComputeOptions {
            max_back_trading_days,
            anchor_ticker,
        },
        price_basis: parse_key(adapter, "compute", "price_basis")?,
        apply_splits: adapter.get_bool("compute", "apply_splits", true),
        buy_only: adapter.get_bool("compute", "buy_only", false),
        skip_failed_tickers: adapter.get_bool("compute", "skip_failed_tickers", false),
        format,
        series_path: optional("output", "series").unwrap_or_else(|| base.join(default_series)),
        trace_path: optional("output", "trace"),
        value_mode: parse_key(adapter, "output", "value_mode")?,
    })
}

fn load_run_config(config_path: &Path) -> Result<RunConfig, ShadowfolioError> {
    info!(path = %config_path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    validate_config(&adapter)?;
    build_run_config(&adapter, &base_dir(config_path))
}

/// Load trades, fetch prices and splits, normalize, and compute.
pub fn run_compute_pipeline(
    trade_port: &dyn TradePort,
    price_port: &dyn PricePort,
    config: &RunConfig,
) -> Result<PipelineOutput, ShadowfolioError> {
    let anchor = config.options.anchor_ticker.as_str();

    let mut events: Vec<TradeEvent> = trade_port.load_events()?;
    if config.buy_only {
        events.retain(TradeEvent::is_buy);
    }
    info!(events = events.len(), "loaded trade events");

    let mut dropped = Vec::new();
    let mut prices: HashMap<String, PriceSeries> = HashMap::new();
    let windows = plan_fetch_windows(&events, anchor, config.options.max_back_trading_days);

    for (ticker, window) in &windows {
        match price_port.fetch_prices(ticker, window.start, window.end) {
            Ok(pair) => {
                prices.insert(ticker.clone(), pair.into_series(config.price_basis));
            }
            Err(e) if ticker != anchor && config.skip_failed_tickers => {
                let removed = drop_ticker_events(&mut events, ticker);
                warn!(ticker = %ticker, removed, error = %e, "skipping ticker without prices");
                dropped.push(ticker.clone());
            }
            Err(e) => return Err(e),
        }
    }

    if events.is_empty() {
        // Nothing to value; an empty run needs no anchor data.
        return Ok(PipelineOutput {
            series: ComputedSeries::default(),
            traces: Vec::new(),
            dropped,
            events_used: 0,
        });
    }

    if config.apply_splits {
        let mut splits: HashMap<String, Vec<SplitEvent>> = HashMap::new();
        for ticker in prices.keys() {
            let found = price_port.fetch_splits(ticker)?;
            if !found.is_empty() {
                splits.insert(ticker.clone(), found);
            }
        }
        events = normalize_buy_events_by_splits(&events, &splits);
        let adjusted = events
            .iter()
            .filter(|e| e.split_adjustment.is_some())
            .count();
        info!(adjusted, "applied split normalization");
    }

    let run = compute_skipping_failed(events, &prices, &config.options, config.skip_failed_tickers)?;
    dropped.extend(run.dropped);
    let events_used: usize = run.traces.iter().map(|t| t.events.len()).sum();

    Ok(PipelineOutput {
        series: run.series,
        traces: run.traces,
        dropped,
        events_used,
    })
}

fn report_port(format: OutputFormat) -> Box<dyn ReportPort> {
    match format {
        OutputFormat::Csv => Box::new(CsvReportAdapter),
        OutputFormat::Json => Box::new(JsonReportAdapter),
    }
}

/// Write the series and, when configured, the traces.
pub fn write_outputs(
    report: &dyn ReportPort,
    output: &PipelineOutput,
    config: &RunConfig,
) -> Result<(), ShadowfolioError> {
    let lines = chart_lines(&output.series, config.value_mode);
    report.write_series(&lines, &output.series, &config.series_path)?;
    if let Some(trace_path) = &config.trace_path {
        report.write_traces(&output.traces, trace_path)?;
    }
    Ok(())
}

fn print_summary(output: &PipelineOutput, config: &RunConfig) {
    let shifted = output.traces.iter().filter(|t| t.anchor_shifted).count();
    let backfilled: usize = output.traces.iter().map(DayTrace::backfilled_count).sum();

    eprintln!("\n=== Summary ===");
    eprintln!("Events:           {}", output.events_used);
    eprintln!("Trade days:       {}", output.traces.len());
    eprintln!("Valued days:      {}", output.series.len());
    if let (Some(p), Some(b)) = (output.series.portfolio.last(), output.series.benchmark.last()) {
        eprintln!("Final portfolio:  {:.2}", p.value);
        eprintln!("Final benchmark:  {:.2} ({})", b.value, config.options.anchor_ticker);
        eprintln!("Excess:           {:+.2}", p.value - b.value);
    }
    eprintln!("Anchor shifts:    {}", shifted);
    eprintln!("Backfilled:       {}", backfilled);
    if !output.dropped.is_empty() {
        eprintln!("Dropped tickers:  {}", output.dropped.join(", "));
    }
}

fn run_compute(
    config_path: &Path,
    trace: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), ShadowfolioError> {
    let mut config = load_run_config(config_path)?;
    if let Some(path) = output {
        config.series_path = path;
    }
    if trace.is_some() {
        config.trace_path = trace;
    }

    let trade_port = CsvTradeAdapter::new(config.buys_path.clone(), config.sells_path.clone());
    let price_port = CsvPriceAdapter::new(config.prices_dir.clone(), config.splits_path.clone());

    let result = run_compute_pipeline(&trade_port, &price_port, &config)?;
    write_outputs(report_port(config.format).as_ref(), &result, &config)?;

    print_summary(&result, &config);
    eprintln!("\nSeries written to: {}", config.series_path.display());
    if let Some(path) = &config.trace_path {
        eprintln!("Trace written to:  {}", path.display());
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ShadowfolioError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_run_config(config_path)?;

    eprintln!("  buys:        {}", config.buys_path.display());
    if let Some(sells) = &config.sells_path {
        eprintln!("  sells:       {}", sells.display());
    }
    eprintln!("  prices_dir:  {}", config.prices_dir.display());
    eprintln!("  anchor:      {}", config.options.anchor_ticker);
    eprintln!("  max_back:    {}", config.options.max_back_trading_days);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

/// Prices for `ticker` around `date`, wide enough for backfill and the
/// anchor's next-day probe.
fn fetch_around(
    config: &RunConfig,
    ticker: &str,
    date: chrono::NaiveDate,
) -> Result<PriceSeries, ShadowfolioError> {
    let port = CsvPriceAdapter::new(config.prices_dir.clone(), None);
    let pair = port.fetch_prices(
        ticker,
        shift_trading_days(date, backfill_lead(config.options.max_back_trading_days)),
        shift_trading_days(date, 1),
    )?;
    Ok(pair.into_series(config.price_basis))
}

fn run_price(config_path: &Path, ticker: &str, date: &str) -> Result<(), ShadowfolioError> {
    let config = load_run_config(config_path)?;
    let date = parse_iso_date(date)?;
    let series = fetch_around(&config, ticker, date)?;
    let hit = get_price_at_or_before(&series, date, config.options.max_back_trading_days)?;

    println!(
        "{} {} used={} price={} backfilled={}",
        ticker, date, hit.used_date, hit.price, hit.backfilled
    );
    Ok(())
}

fn run_resolve_date(config_path: &Path, date: &str) -> Result<(), ShadowfolioError> {
    let config = load_run_config(config_path)?;
    let anchor = &config.options.anchor_ticker;
    let date = parse_iso_date(date)?;
    let series = fetch_around(&config, anchor, date)?;
    let r = resolve_date_by_anchor(&series, date)?;

    println!(
        "{} resolved={} shifted={} anchor={}",
        date, r.resolved_date, r.shifted, anchor
    );
    Ok(())
}
