//! Trade history from brokerage CSV exports.
//!
//! Columns are located by header name, so exports with extra or reordered
//! columns load unchanged. BUY files carry the invested cost, SELL files the
//! settlement proceeds.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::calendar::parse_trade_date;
use crate::domain::error::{ComputeError, ShadowfolioError};
use crate::domain::number::parse_number_strict;
use crate::domain::trade::{dedupe_events, TradeEvent, TradeType};
use crate::ports::trade_port::TradePort;

const DATE_HEADER: &str = "trade_date";
const TICKER_HEADER: &str = "ticker";
const SHARES_HEADER: &str = "shares";

fn cash_header(trade_type: TradeType) -> &'static str {
    match trade_type {
        TradeType::Buy => "cost",
        TradeType::Sell => "proceeds",
    }
}

pub struct CsvTradeAdapter {
    buys_path: PathBuf,
    sells_path: Option<PathBuf>,
}

impl CsvTradeAdapter {
    pub fn new(buys_path: PathBuf, sells_path: Option<PathBuf>) -> Self {
        Self {
            buys_path,
            sells_path,
        }
    }
}

impl TradePort for CsvTradeAdapter {
    fn load_events(&self) -> Result<Vec<TradeEvent>, ShadowfolioError> {
        let mut events = read_trade_file(&self.buys_path, TradeType::Buy)?;
        if let Some(sells) = &self.sells_path {
            events.extend(read_trade_file(sells, TradeType::Sell)?);
        }
        Ok(dedupe_events(events))
    }
}

fn source_error(path: &Path, line: u64, reason: impl std::fmt::Display) -> ShadowfolioError {
    ShadowfolioError::Source {
        reason: format!("{}:{}: {}", path.display(), line, reason),
    }
}

fn row_error(path: &Path, line: u64, err: ComputeError) -> ShadowfolioError {
    source_error(path, line, format!("{} {}", err.kind(), err))
}

/// Read one BUY or SELL export.
pub fn read_trade_file(path: &Path, trade_type: TradeType) -> Result<Vec<TradeEvent>, ShadowfolioError> {
    let content = fs::read_to_string(path).map_err(|e| ShadowfolioError::Source {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    parse_trade_csv(&content, trade_type).map_err(|(line, reason)| match reason {
        RowFailure::Compute(err) => row_error(path, line, err),
        RowFailure::Other(reason) => source_error(path, line, reason),
    })
}

enum RowFailure {
    Compute(ComputeError),
    Other(String),
}

impl From<ComputeError> for RowFailure {
    fn from(err: ComputeError) -> Self {
        RowFailure::Compute(err)
    }
}

fn parse_trade_csv(content: &str, trade_type: TradeType) -> Result<Vec<TradeEvent>, (u64, RowFailure)> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| (1, RowFailure::Other(format!("CSV header error: {e}"))))?
        .clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty())
        .map(|(i, h)| (h.to_lowercase(), i))
        .collect();

    let cash_name = cash_header(trade_type);
    let column = |name: &str| {
        index.get(name).copied().ok_or_else(|| {
            let available: Vec<&str> = headers.iter().collect();
            (
                1,
                RowFailure::Other(format!(
                    "missing {trade_type} column {name:?} (available: {})",
                    available.join(", ")
                )),
            )
        })
    };
    let date_idx = column(DATE_HEADER)?;
    let ticker_idx = column(TICKER_HEADER)?;
    let shares_idx = column(SHARES_HEADER)?;
    let cash_idx = column(cash_name)?;

    let mut events = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            (line, RowFailure::Other(format!("CSV parse error: {e}")))
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let parse_row = || -> Result<TradeEvent, RowFailure> {
            let display = cell(date_idx);
            let date = parse_trade_date(display)?;

            let ticker = cell(ticker_idx)
                .split_whitespace()
                .next()
                .ok_or_else(|| RowFailure::Other("missing ticker".into()))?;

            let shares = parse_number_strict(cell(shares_idx))?;
            if shares <= 0.0 {
                return Err(RowFailure::Other(format!(
                    "shares must be positive, got {shares}"
                )));
            }
            let cash = parse_number_strict(cell(cash_idx))?;
            if cash < 0.0 {
                return Err(RowFailure::Other(format!(
                    "{cash_name} must not be negative, got {cash}"
                )));
            }

            Ok(TradeEvent::new(trade_type, display, date, ticker, shares, cash))
        };
        events.push(parse_row().map_err(|f| (line, f))?);
    }

    Ok(events)
}
