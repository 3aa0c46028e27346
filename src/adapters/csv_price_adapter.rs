//! Daily quotes and splits from CSV files.
//!
//! Quotes live in `<prices_dir>/<TICKER>.csv` with `date,close,adj_close`
//! columns. Splits for all tickers share one optional `ticker,date,ratio` file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::calendar::parse_iso_date;
use crate::domain::error::ShadowfolioError;
use crate::domain::price::{PricePair, PriceSeries};
use crate::domain::split::{parse_split_ratio, SplitEvent};
use crate::ports::price_port::PricePort;

pub struct CsvPriceAdapter {
    prices_dir: PathBuf,
    splits_path: Option<PathBuf>,
}

impl CsvPriceAdapter {
    pub fn new(prices_dir: PathBuf, splits_path: Option<PathBuf>) -> Self {
        Self {
            prices_dir,
            splits_path,
        }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.prices_dir.join(format!("{}.csv", ticker))
    }
}

fn source_error(path: &Path, reason: impl std::fmt::Display) -> ShadowfolioError {
    ShadowfolioError::Source {
        reason: format!("{}: {}", path.display(), reason),
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

/// A quote cell: `None` for gaps (empty, `null`, non-finite), an error for
/// anything else that is not a positive number.
fn parse_price_cell(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    let value: f64 = raw
        .parse()
        .map_err(|e| format!("invalid price {raw:?}: {e}"))?;
    if !value.is_finite() {
        return Ok(None);
    }
    if value <= 0.0 {
        return Err(format!("price must be positive, got {value}"));
    }
    Ok(Some(value))
}

impl PricePort for CsvPriceAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PricePair, ShadowfolioError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| ShadowfolioError::Source {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| source_error(&path, format!("CSV header error: {e}")))?
            .clone();
        let date_idx = find_column(&headers, &["date"])
            .ok_or_else(|| source_error(&path, "missing date column"))?;
        let close_idx = find_column(&headers, &["close"])
            .ok_or_else(|| source_error(&path, "missing close column"))?;
        let adj_idx = find_column(&headers, &["adj_close", "adjclose", "adj close"]);

        let mut pair = PricePair {
            close: PriceSeries::new(ticker),
            adj_close: PriceSeries::new(ticker),
        };

        for result in rdr.records() {
            let record =
                result.map_err(|e| source_error(&path, format!("CSV parse error: {e}")))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let date = parse_iso_date(record.get(date_idx).unwrap_or(""))
                .map_err(|e| source_error(&path, format!("line {line}: {} {e}", e.kind())))?;
            if date < start || date > end {
                continue;
            }

            let cell = |idx: usize| {
                parse_price_cell(record.get(idx).unwrap_or(""))
                    .map_err(|reason| source_error(&path, format!("line {line}: {reason}")))
            };
            if let Some(close) = cell(close_idx)? {
                pair.close.insert(date, close);
            }
            if let Some(idx) = adj_idx {
                if let Some(adj) = cell(idx)? {
                    pair.adj_close.insert(date, adj);
                }
            }
        }

        // Lookups report an empty window as a missing price.
        if pair.close.is_empty() && pair.adj_close.is_empty() {
            debug!(ticker, %start, %end, "no quotes in window");
        }

        debug!(
            ticker,
            close = pair.close.len(),
            adj_close = pair.adj_close.len(),
            "loaded prices"
        );
        Ok(pair)
    }

    fn fetch_splits(&self, ticker: &str) -> Result<Vec<SplitEvent>, ShadowfolioError> {
        let Some(path) = &self.splits_path else {
            return Ok(Vec::new());
        };
        let content = fs::read_to_string(path).map_err(|e| ShadowfolioError::Source {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| source_error(path, format!("CSV header error: {e}")))?
            .clone();
        let ticker_idx = find_column(&headers, &["ticker"])
            .ok_or_else(|| source_error(path, "missing ticker column"))?;
        let date_idx = find_column(&headers, &["date"])
            .ok_or_else(|| source_error(path, "missing date column"))?;
        let ratio_idx = find_column(&headers, &["ratio"])
            .ok_or_else(|| source_error(path, "missing ratio column"))?;

        let mut splits = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| source_error(path, format!("CSV parse error: {e}")))?;
            if record.get(ticker_idx) != Some(ticker) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let iso_date_et = parse_iso_date(record.get(date_idx).unwrap_or(""))
                .map_err(|e| source_error(path, format!("line {line}: {} {e}", e.kind())))?;
            let factor = parse_split_ratio(record.get(ratio_idx).unwrap_or(""))
                .map_err(|e| source_error(path, format!("line {line}: {} {e}", e.kind())))?;
            splits.push(SplitEvent {
                iso_date_et,
                factor,
            });
        }

        splits.sort_by_key(|s| s.iso_date_et);
        Ok(splits)
    }
}
