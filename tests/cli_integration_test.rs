//! CLI integration tests for the compute command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_run_config) and path resolution
//! - The load/fetch/normalize/compute pipeline with mock ports
//! - Skip-failed-ticker policy
//! - End-to-end runs over real CSV files on disk
//! - Subcommand outcomes and their exit codes

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use shadowfolio::adapters::csv_price_adapter::CsvPriceAdapter;
use shadowfolio::adapters::csv_trade_adapter::CsvTradeAdapter;
use shadowfolio::adapters::file_config_adapter::FileConfigAdapter;
use shadowfolio::cli::{self, Cli, OutputFormat, RunConfig};
use shadowfolio::domain::chart::ValueMode;
use shadowfolio::domain::compute::ComputeOptions;
use shadowfolio::domain::error::{ComputeErrorKind, ShadowfolioError};
use shadowfolio::domain::price::{PriceBasis, PricePair};
use shadowfolio::domain::split::SplitEvent;
use std::path::{Path, PathBuf};

const VALID_INI: &str = r#"
[data]
buys = data/buys.csv
sells = data/sells.csv
prices_dir = prices
splits = data/splits.csv

[compute]
anchor_ticker = VOO
max_back_trading_days = 3
price_basis = adj_close
apply_splits = false
buy_only = true
skip_failed_tickers = yes

[output]
format = json
series = out/series.json
trace = out/trace.jsonl
value_mode = percent
"#;

fn base_config(dir: &Path) -> RunConfig {
    RunConfig {
        buys_path: dir.join("buys.csv"),
        sells_path: None,
        prices_dir: dir.join("prices"),
        splits_path: None,
        options: ComputeOptions::default(),
        price_basis: PriceBasis::Close,
        apply_splits: true,
        buy_only: false,
        skip_failed_tickers: false,
        format: OutputFormat::Csv,
        series_path: dir.join("series.csv"),
        trace_path: None,
        value_mode: ValueMode::Amount,
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn build_run_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_run_config(&adapter, Path::new("/work")).unwrap();

        assert_eq!(config.buys_path, PathBuf::from("/work/data/buys.csv"));
        assert_eq!(config.sells_path, Some(PathBuf::from("/work/data/sells.csv")));
        assert_eq!(config.prices_dir, PathBuf::from("/work/prices"));
        assert_eq!(config.options.anchor_ticker, "VOO");
        assert_eq!(config.options.max_back_trading_days, 3);
        assert_eq!(config.price_basis, PriceBasis::AdjClose);
        assert!(!config.apply_splits);
        assert!(config.buy_only);
        assert!(config.skip_failed_tickers);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.series_path, PathBuf::from("/work/out/series.json"));
        assert_eq!(config.trace_path, Some(PathBuf::from("/work/out/trace.jsonl")));
        assert_eq!(config.value_mode, ValueMode::Percent);
    }

    #[test]
    fn build_run_config_uses_defaults() {
        let ini = "[data]\nbuys = buys.csv\nprices_dir = /abs/prices\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = cli::build_run_config(&adapter, Path::new("cfg")).unwrap();

        assert_eq!(config.prices_dir, PathBuf::from("/abs/prices"));
        assert_eq!(config.options, ComputeOptions::default());
        assert_eq!(config.price_basis, PriceBasis::Close);
        assert!(config.apply_splits);
        assert!(!config.buy_only);
        assert!(!config.skip_failed_tickers);
        assert_eq!(config.format, OutputFormat::Csv);
        assert_eq!(config.series_path, PathBuf::from("cfg/series.csv"));
        assert_eq!(config.trace_path, None);
        assert_eq!(config.value_mode, ValueMode::Amount);
    }

    #[test]
    fn build_run_config_missing_buys() {
        let adapter = FileConfigAdapter::from_string("[data]\nprices_dir = p\n").unwrap();
        let err = cli::build_run_config(&adapter, Path::new(".")).unwrap_err();
        assert!(matches!(err, ShadowfolioError::ConfigMissing { key, .. } if key == "buys"));
    }

    #[test]
    fn build_run_config_bad_enum() {
        let ini = "[data]\nbuys = b.csv\nprices_dir = p\n[output]\nvalue_mode = ratio\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = cli::build_run_config(&adapter, Path::new(".")).unwrap_err();
        assert!(matches!(err, ShadowfolioError::ConfigInvalid { key, .. } if key == "value_mode"));
    }

    #[test]
    fn relative_and_absolute_paths() {
        assert_eq!(
            cli::resolve_path(Path::new("/a/b"), " c.csv "),
            PathBuf::from("/a/b/c.csv")
        );
        assert_eq!(
            cli::resolve_path(Path::new("/a/b"), "/x/c.csv"),
            PathBuf::from("/x/c.csv")
        );
    }
}

mod pipeline {
    use super::*;

    fn round_trip_port() -> MockPricePort {
        MockPricePort::new()
            .with_series("AAA", &[("2024-01-02", 10.0), ("2024-01-10", 12.0)])
            .with_series("VTI", &[("2024-01-02", 100.0), ("2024-01-10", 110.0)])
    }

    #[test]
    fn round_trip_through_ports() {
        let trades = MockTradePort::new(vec![
            buy("2024-01-03", "AAA", 1.0, 100.0),
            sell("2024-01-10", "AAA", 1.0, 100.0),
        ]);
        let prices = round_trip_port();
        let config = base_config(Path::new("/unused"));

        let out = cli::run_compute_pipeline(&trades, &prices, &config).unwrap();

        assert_eq!(out.series.resolved_iso_dates_et, vec![d("2024-01-02"), d("2024-01-10")]);
        assert_eq!(out.series.portfolio[1].value, 0.0);
        assert_abs_diff_eq!(out.series.benchmark[1].value, 10.0, epsilon = 1e-9);
        assert_eq!(out.traces.len(), 2);
        assert_eq!(out.events_used, 2);
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn fetch_windows_requested_per_ticker() {
        let trades = MockTradePort::new(vec![
            buy("2024-01-03", "AAA", 1.0, 100.0),
            sell("2024-01-10", "AAA", 1.0, 100.0),
        ]);
        let prices = round_trip_port();
        let mut config = base_config(Path::new("/unused"));
        config.options.max_back_trading_days = 1;

        cli::run_compute_pipeline(&trades, &prices, &config).unwrap();

        let requests = prices.requests.borrow();
        assert_eq!(requests.len(), 2);
        // Two trading days before 2024-01-03, one after 2024-01-10.
        assert!(requests
            .iter()
            .all(|(_, start, end)| *start == d("2024-01-01") && *end == d("2024-01-11")));
    }

    #[test]
    fn buy_only_ignores_sells() {
        let trades = MockTradePort::new(vec![
            buy("2024-01-02", "AAA", 1.0, 100.0),
            sell("2024-01-10", "AAA", 5.0, 1000.0),
        ]);
        let mut config = base_config(Path::new("/unused"));
        config.buy_only = true;

        let out = cli::run_compute_pipeline(&trades, &round_trip_port(), &config).unwrap();
        assert_eq!(out.series.len(), 1);
        assert_eq!(out.events_used, 1);
    }

    #[test]
    fn adjusted_basis_selects_adj_close() {
        let trades = MockTradePort::new(vec![buy("2024-01-02", "AAA", 2.0, 20.0)]);
        let prices = MockPricePort::new()
            .with_pair(
                "AAA",
                PricePair {
                    close: series("AAA", &[("2024-01-02", 10.0)]),
                    adj_close: series("AAA", &[("2024-01-02", 9.0)]),
                },
            )
            .with_series("VTI", &[("2024-01-02", 100.0)]);
        let mut config = base_config(Path::new("/unused"));
        config.price_basis = PriceBasis::AdjClose;

        let out = cli::run_compute_pipeline(&trades, &prices, &config).unwrap();
        assert_eq!(out.series.portfolio[0].value, 18.0);
    }

    #[test]
    fn splits_are_applied_before_valuation() {
        let trades = MockTradePort::new(vec![buy("2024-01-02", "AAA", 1.0, 10.0)]);
        let prices = MockPricePort::new()
            .with_series("AAA", &[("2024-01-02", 10.0), ("2024-01-10", 3.0)])
            .with_series("VTI", &[("2024-01-02", 100.0), ("2024-01-10", 100.0)])
            .with_splits(
                "AAA",
                vec![SplitEvent {
                    iso_date_et: d("2024-01-05"),
                    factor: 4.0,
                }],
            );
        let config = base_config(Path::new("/unused"));

        let out = cli::run_compute_pipeline(&trades, &prices, &config).unwrap();
        // Four post-split shares valued at the trade-day price.
        assert_eq!(out.series.portfolio[0].value, 40.0);
        let adj = out.traces[0].events[0].event.split_adjustment.as_ref().unwrap();
        assert_eq!(adj.chain, vec!["2024-01-05 x4"]);
    }

    #[test]
    fn anchor_fetch_failure_is_fatal() {
        let trades = MockTradePort::new(vec![buy("2024-01-02", "AAA", 1.0, 10.0)]);
        let prices = round_trip_port().with_error("VTI", "timeout");
        let mut config = base_config(Path::new("/unused"));
        config.skip_failed_tickers = true;

        let err = cli::run_compute_pipeline(&trades, &prices, &config).unwrap_err();
        assert!(matches!(err, ShadowfolioError::Source { reason } if reason == "timeout"));
    }

    #[test]
    fn ticker_fetch_failure_skipped_when_configured() {
        let trades = MockTradePort::new(vec![
            buy("2024-01-02", "AAA", 1.0, 10.0),
            buy("2024-01-02", "BAD", 1.0, 10.0),
        ]);
        let prices = round_trip_port().with_error("BAD", "HTTP 404");

        let config = base_config(Path::new("/unused"));
        assert!(cli::run_compute_pipeline(&trades, &prices, &config).is_err());

        let mut config = base_config(Path::new("/unused"));
        config.skip_failed_tickers = true;
        let out = cli::run_compute_pipeline(&trades, &prices, &config).unwrap();
        assert_eq!(out.dropped, vec!["BAD".to_string()]);
        assert_eq!(out.series.portfolio[0].value, 10.0);
        assert_abs_diff_eq!(out.series.benchmark[0].value, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn compute_failure_retried_without_ticker() {
        // BBB has prices, but none within the backfill window of 2024-01-10.
        let trades = MockTradePort::new(vec![
            buy("2024-01-02", "AAA", 1.0, 10.0),
            buy("2024-01-10", "BBB", 1.0, 10.0),
        ]);
        let prices = round_trip_port().with_series("BBB", &[("2023-06-01", 5.0)]);

        let config = base_config(Path::new("/unused"));
        let err = cli::run_compute_pipeline(&trades, &prices, &config).unwrap_err();
        assert!(
            matches!(&err, ShadowfolioError::Compute(e) if e.kind() == ComputeErrorKind::PriceMissing)
        );

        let mut config = base_config(Path::new("/unused"));
        config.skip_failed_tickers = true;
        let out = cli::run_compute_pipeline(&trades, &prices, &config).unwrap();
        assert_eq!(out.dropped, vec!["BBB".to_string()]);
        assert_eq!(out.series.len(), 1);
    }

    #[test]
    fn trade_source_failure_propagates() {
        let trades = MockTradePort::new(vec![]).with_error("unreadable");
        let err =
            cli::run_compute_pipeline(&trades, &round_trip_port(), &base_config(Path::new("/unused")))
                .unwrap_err();
        assert!(matches!(err, ShadowfolioError::Source { .. }));
    }

    #[test]
    fn no_events_yields_empty_output() {
        let trades = MockTradePort::new(vec![]);
        let prices = MockPricePort::new();
        let out = cli::run_compute_pipeline(&trades, &prices, &base_config(Path::new("/unused")))
            .unwrap();
        assert!(out.series.is_empty());
        assert!(prices.requests.borrow().is_empty());
    }
}

mod end_to_end {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "data/buys.csv",
            "trade_date,ticker,shares,cost\n\
             2024/01/03,AAA Alpha Corp,1,100\n\
             2024/01/03,AAA Alpha Corp,1,100\n",
        );
        write_file(
            dir.path(),
            "data/sells.csv",
            "trade_date,ticker,shares,proceeds\n2024/01/10,AAA,1,100\n",
        );
        write_file(
            dir.path(),
            "prices/AAA.csv",
            "date,close,adj_close\n2024-01-02,10,10\n2024-01-10,12,12\n",
        );
        write_file(
            dir.path(),
            "prices/VTI.csv",
            "date,close,adj_close\n2024-01-02,100,99\n2024-01-10,110,109\n",
        );
        dir
    }

    fn write_config(dir: &Path, output: &str) -> PathBuf {
        write_file(
            dir,
            "shadowfolio.ini",
            &format!(
                "[data]\nbuys = data/buys.csv\nsells = data/sells.csv\nprices_dir = prices\n\n{output}"
            ),
        )
    }

    #[test]
    fn csv_files_through_real_adapters() {
        let dir = setup();
        let config_path = write_config(dir.path(), "");
        let adapter = FileConfigAdapter::from_file(&config_path).unwrap();
        let config = cli::build_run_config(&adapter, dir.path()).unwrap();

        let trades = CsvTradeAdapter::new(config.buys_path.clone(), config.sells_path.clone());
        let prices = CsvPriceAdapter::new(config.prices_dir.clone(), config.splits_path.clone());
        let out = cli::run_compute_pipeline(&trades, &prices, &config).unwrap();

        // The duplicated buy row is collapsed.
        assert_eq!(out.events_used, 2);
        assert_eq!(out.series.portfolio[0].value, 10.0);
        assert_abs_diff_eq!(out.series.benchmark[1].value, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn compute_command_writes_csv_outputs() {
        let dir = setup();
        let config_path = write_config(dir.path(), "[output]\nvalue_mode = excess\n");
        let trace_path = dir.path().join("trace.csv");

        let cli_args = Cli::parse_from([
            "shadowfolio",
            "compute",
            "-c",
            config_path.to_str().unwrap(),
            "--trace",
            trace_path.to_str().unwrap(),
        ]);
        cli::run(cli_args);

        let series = std::fs::read_to_string(dir.path().join("series.csv")).unwrap();
        let rows: Vec<&str> = series.lines().collect();
        assert_eq!(rows[0], "date,ts_ms,portfolio,benchmark,excess");
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("2024-01-02,"));

        let trace = std::fs::read_to_string(&trace_path).unwrap();
        assert_eq!(trace.lines().count(), 3);
    }

    #[test]
    fn compute_command_writes_json_outputs() {
        let dir = setup();
        let config_path = write_config(
            dir.path(),
            "[output]\nformat = json\nseries = out.json\ntrace = trace.jsonl\n",
        );
        cli::run(Cli::parse_from([
            "shadowfolio",
            "compute",
            "--config",
            config_path.to_str().unwrap(),
        ]));

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("out.json")).unwrap())
                .unwrap();
        assert_eq!(doc["resolved_iso_dates_et"][1], "2024-01-10");
        assert_eq!(doc["lines"][0]["name"], "portfolio");

        let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
        assert_eq!(trace.lines().count(), 2);
    }

    #[test]
    fn output_override_wins() {
        let dir = setup();
        let config_path = write_config(dir.path(), "");
        let custom = dir.path().join("custom.csv");
        cli::run(Cli::parse_from([
            "shadowfolio",
            "compute",
            "-c",
            config_path.to_str().unwrap(),
            "-o",
            custom.to_str().unwrap(),
        ]));
        assert!(custom.exists());
        assert!(!dir.path().join("series.csv").exists());
    }

    #[test]
    fn invalid_config_writes_nothing() {
        let dir = setup();
        let config_path = write_config(dir.path(), "[compute]\nmax_back_trading_days = 99\n");
        cli::run(Cli::parse_from([
            "shadowfolio",
            "compute",
            "-c",
            config_path.to_str().unwrap(),
        ]));
        assert!(!dir.path().join("series.csv").exists());
    }
}

mod commands {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn execute(args: &[&str]) -> Result<(), ShadowfolioError> {
        let mut argv = vec!["shadowfolio"];
        argv.extend_from_slice(args);
        cli::execute(Cli::parse_from(argv))
    }

    fn exit_code(result: Result<(), ShadowfolioError>) -> u8 {
        result.map_or_else(|e| e.exit_code(), |()| 0)
    }

    /// AAA's only quote is ten trading days before the 2024-01-10 buy.
    fn stale_quote_setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "buys.csv",
            "trade_date,ticker,shares,cost\n2024/01/10,AAA,1,100\n",
        );
        write_file(dir.path(), "prices/AAA.csv", "date,close,adj_close\n2023-12-27,9,9\n");
        write_file(
            dir.path(),
            "prices/VTI.csv",
            "date,close,adj_close\n2024-01-09,100,100\n2024-01-10,100,100\n",
        );
        let config = write_file(
            dir.path(),
            "shadowfolio.ini",
            "[data]\nbuys = buys.csv\nprices_dir = prices\n",
        );
        (dir, config)
    }

    fn healthy_setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "buys.csv",
            "trade_date,ticker,shares,cost\n2024/01/09,AAA,1,10\n",
        );
        write_file(
            dir.path(),
            "prices/AAA.csv",
            "date,close,adj_close\n2024-01-08,9,9\n2024-01-09,10,10\n",
        );
        write_file(
            dir.path(),
            "prices/VTI.csv",
            "date,close,adj_close\n2024-01-02,100,100\n2024-01-09,100,100\n2024-01-10,101,101\n",
        );
        let config = write_file(
            dir.path(),
            "shadowfolio.ini",
            "[data]\nbuys = buys.csv\nprices_dir = prices\n",
        );
        (dir, config)
    }

    #[test]
    fn validate_accepts_good_config() {
        let (_dir, config) = healthy_setup();
        assert!(execute(&["validate", "-c", config.to_str().unwrap()]).is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_backfill() {
        let dir = TempDir::new().unwrap();
        let config = write_file(
            dir.path(),
            "shadowfolio.ini",
            "[data]\nbuys = b.csv\nprices_dir = p\n[compute]\nmax_back_trading_days = 99\n",
        );
        let result = execute(&["validate", "-c", config.to_str().unwrap()]);
        assert!(matches!(result, Err(ShadowfolioError::ConfigInvalid { .. })));
        assert_eq!(exit_code(result), 2);
    }

    #[test]
    fn validate_missing_config_file() {
        let result = execute(&["validate", "-c", "/nonexistent/shadowfolio.ini"]);
        assert!(matches!(result, Err(ShadowfolioError::ConfigParse { .. })));
        assert_eq!(exit_code(result), 2);
    }

    #[test]
    fn price_exact_and_backfilled() {
        let (_dir, config) = healthy_setup();
        let config = config.to_str().unwrap();
        assert!(execute(&["price", "-c", config, "--ticker", "AAA", "--date", "2024-01-09"]).is_ok());
        assert!(execute(&["price", "-c", config, "--ticker", "AAA", "--date", "2024-01-12"]).is_ok());
    }

    #[test]
    fn price_beyond_backfill_window_is_price_missing() {
        let (_dir, config) = stale_quote_setup();
        let result = execute(&[
            "price",
            "-c",
            config.to_str().unwrap(),
            "--ticker",
            "AAA",
            "--date",
            "2024-01-10",
        ]);
        match &result {
            Err(ShadowfolioError::Compute(e)) => {
                assert_eq!(e.kind(), ComputeErrorKind::PriceMissing);
                assert_eq!(e.ticker(), Some("AAA"));
            }
            other => panic!("expected PRICE_MISSING, got {other:?}"),
        }
        assert_eq!(exit_code(result), 4);
    }

    #[test]
    fn price_unknown_ticker_is_source_error() {
        let (_dir, config) = healthy_setup();
        let result = execute(&[
            "price",
            "-c",
            config.to_str().unwrap(),
            "--ticker",
            "ZZZ",
            "--date",
            "2024-01-09",
        ]);
        assert_eq!(exit_code(result), 3);
    }

    #[test]
    fn price_rejects_non_iso_date() {
        let (_dir, config) = healthy_setup();
        let result = execute(&[
            "price",
            "-c",
            config.to_str().unwrap(),
            "--ticker",
            "AAA",
            "--date",
            "01/09/2024",
        ]);
        match &result {
            Err(ShadowfolioError::Compute(e)) => assert_eq!(e.kind(), ComputeErrorKind::InvalidDate),
            other => panic!("expected INVALID_DATE, got {other:?}"),
        }
    }

    #[test]
    fn resolve_date_outcomes() {
        let (_dir, config) = healthy_setup();
        let config = config.to_str().unwrap();
        // Present on the anchor.
        assert!(execute(&["resolve-date", "-c", config, "--date", "2024-01-10"]).is_ok());
        // Next-day probe: 2024-01-08 is absent but 2024-01-09 exists.
        assert!(execute(&["resolve-date", "-c", config, "--date", "2024-01-08"]).is_ok());

        // 2024-01-05 and both neighbours are absent.
        let result = execute(&["resolve-date", "-c", config, "--date", "2024-01-05"]);
        match &result {
            Err(ShadowfolioError::Compute(e)) => {
                assert_eq!(e.kind(), ComputeErrorKind::AnchorDateUnresolved)
            }
            other => panic!("expected ANCHOR_DATE_UNRESOLVED, got {other:?}"),
        }
        assert_eq!(exit_code(result), 4);
    }

    #[test]
    fn compute_succeeds_and_writes_series() {
        let (dir, config) = healthy_setup();
        assert!(execute(&["compute", "-c", config.to_str().unwrap()]).is_ok());
        assert!(dir.path().join("series.csv").exists());
    }

    #[test]
    fn compute_stale_quote_exits_with_compute_code() {
        let (dir, config) = stale_quote_setup();
        let result = execute(&["compute", "-c", config.to_str().unwrap()]);
        match &result {
            Err(ShadowfolioError::Compute(e)) => {
                assert_eq!(e.kind(), ComputeErrorKind::PriceMissing)
            }
            other => panic!("expected PRICE_MISSING, got {other:?}"),
        }
        assert_eq!(exit_code(result), 4);
        assert!(!dir.path().join("series.csv").exists());
    }

    #[test]
    fn compute_missing_trades_file_is_source_error() {
        let (dir, config) = healthy_setup();
        std::fs::remove_file(dir.path().join("buys.csv")).unwrap();
        let result = execute(&["compute", "-c", config.to_str().unwrap()]);
        assert!(matches!(result, Err(ShadowfolioError::Source { .. })));
        assert_eq!(exit_code(result), 3);
    }
}
