//! CSV output: one row per valued day, and a flattened trace table.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::chart::ChartLine;
use crate::domain::compute::ComputedSeries;
use crate::domain::error::ShadowfolioError;
use crate::domain::trace::{DayTrace, PriceUsed};
use crate::ports::report_port::ReportPort;

const SERIES_HEADER: &[&str] = &["date", "ts_ms", "portfolio", "benchmark"];

const TRACE_HEADER: &[&str] = &[
    "day_key",
    "resolved_date",
    "anchor_shifted",
    "type",
    "ticker",
    "trade_date_display",
    "shares",
    "cash",
    "split_factor",
    "split_chain",
    "split_from_shares",
    "benchmark_price",
    "benchmark_delta_shares",
    "benchmark_shares_after",
    "day_cash_total",
    "benchmark_delta_shares_total",
    "portfolio_value",
    "benchmark_value",
    "benchmark_price_date",
    "prices_used",
    "holdings_after",
    "backfilled_prices",
];

pub struct CsvReportAdapter;

fn report_error(reason: impl std::fmt::Display) -> ShadowfolioError {
    ShadowfolioError::Report {
        reason: format!("CSV write error: {reason}"),
    }
}

fn create(path: &Path) -> Result<File, ShadowfolioError> {
    File::create(path).map_err(|e| ShadowfolioError::Report {
        reason: format!("failed to create {}: {}", path.display(), e),
    })
}

/// Columns are the raw legs followed by one column per non-raw chart line.
/// A line that skipped a day leaves that cell empty.
pub fn write_series_csv(
    lines: &[ChartLine],
    series: &ComputedSeries,
    writer: impl Write,
) -> Result<(), ShadowfolioError> {
    let extra: Vec<(&str, HashMap<i64, f64>)> = lines
        .iter()
        .filter(|l| l.name != "portfolio" && l.name != "benchmark")
        .map(|l| {
            let by_ts = l.points.iter().map(|p| (p.ts_ms, p.value)).collect();
            (l.name.as_str(), by_ts)
        })
        .collect();

    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let mut header: Vec<&str> = SERIES_HEADER.to_vec();
    header.extend(extra.iter().map(|(name, _)| *name));
    csv.write_record(&header).map_err(report_error)?;

    for i in 0..series.len() {
        let ts_ms = series.portfolio[i].ts_ms;
        let mut row = vec![
            series.resolved_iso_dates_et[i].format("%Y-%m-%d").to_string(),
            ts_ms.to_string(),
            series.portfolio[i].value.to_string(),
            series.benchmark[i].value.to_string(),
        ];
        row.extend(
            extra
                .iter()
                .map(|(_, by_ts)| by_ts.get(&ts_ms).map(f64::to_string).unwrap_or_default()),
        );
        csv.write_record(&row).map_err(report_error)?;
    }

    csv.flush().map_err(report_error)?;
    Ok(())
}

/// `TICKER=price@used_date` per portfolio price, `;`-separated.
fn format_prices(prices: &[PriceUsed]) -> String {
    prices
        .iter()
        .map(|p| format!("{}={}@{}", p.ticker, p.price, p.used_date.format("%Y-%m-%d")))
        .collect::<Vec<_>>()
        .join(";")
}

/// One row per applied event. Day-level columns repeat on every row of the day.
pub fn write_traces_csv(traces: &[DayTrace], writer: impl Write) -> Result<(), ShadowfolioError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv.write_record(TRACE_HEADER).map_err(report_error)?;

    for day in traces {
        let holdings = day
            .holdings_after
            .iter()
            .map(|h| format!("{}={}", h.ticker, h.shares))
            .collect::<Vec<_>>()
            .join(";");
        let day_cols = [
            day.day_cash_total.to_string(),
            day.benchmark_delta_shares_total.to_string(),
            day.portfolio_value.to_string(),
            day.benchmark_value.to_string(),
            day.benchmark_price_used.used_date.format("%Y-%m-%d").to_string(),
            format_prices(&day.portfolio_prices_used),
            holdings,
            day.backfilled_count().to_string(),
        ];

        for et in &day.events {
            let split = et.event.split_adjustment.as_ref();
            let mut row = vec![
                day.day_key.format("%Y-%m-%d").to_string(),
                day.resolved_date.format("%Y-%m-%d").to_string(),
                day.anchor_shifted.to_string(),
                et.event.trade_type.to_string(),
                et.event.ticker.clone(),
                et.event.trade_date_display.clone(),
                et.event.shares.to_string(),
                et.event.cash.to_string(),
                split.map(|s| s.factor.to_string()).unwrap_or_default(),
                split.map(|s| s.chain.join(" ")).unwrap_or_default(),
                split.map(|s| s.from_shares.to_string()).unwrap_or_default(),
                et.benchmark_price.to_string(),
                et.benchmark_delta_shares.to_string(),
                et.benchmark_shares_after.to_string(),
            ];
            row.extend(day_cols.iter().cloned());
            csv.write_record(&row).map_err(report_error)?;
        }
    }

    csv.flush().map_err(report_error)?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write_series(
        &self,
        lines: &[ChartLine],
        series: &ComputedSeries,
        output_path: &Path,
    ) -> Result<(), ShadowfolioError> {
        write_series_csv(lines, series, create(output_path)?)
    }

    fn write_traces(&self, traces: &[DayTrace], output_path: &Path) -> Result<(), ShadowfolioError> {
        write_traces_csv(traces, create(output_path)?)
    }
}
