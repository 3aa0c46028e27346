#![allow(dead_code)]

use chrono::NaiveDate;
use shadowfolio::domain::error::ShadowfolioError;
use shadowfolio::domain::price::{PricePair, PriceSeries};
use shadowfolio::domain::split::SplitEvent;
pub use shadowfolio::domain::trade::{TradeEvent, TradeType};
use shadowfolio::ports::price_port::PricePort;
use shadowfolio::ports::trade_port::TradePort;
use std::cell::RefCell;
use std::collections::HashMap;

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn buy(date: &str, ticker: &str, shares: f64, cash: f64) -> TradeEvent {
    TradeEvent::new(TradeType::Buy, date, d(date), ticker, shares, cash)
}

pub fn sell(date: &str, ticker: &str, shares: f64, cash: f64) -> TradeEvent {
    TradeEvent::new(TradeType::Sell, date, d(date), ticker, shares, cash)
}

pub fn series(ticker: &str, points: &[(&str, f64)]) -> PriceSeries {
    PriceSeries::from_points(ticker, points.iter().map(|(k, v)| (d(k), *v)))
}

pub fn price_map(entries: Vec<PriceSeries>) -> HashMap<String, PriceSeries> {
    entries
        .into_iter()
        .map(|s| (s.ticker.clone(), s))
        .collect()
}

pub struct MockTradePort {
    pub events: Vec<TradeEvent>,
    pub error: Option<String>,
}

impl MockTradePort {
    pub fn new(events: Vec<TradeEvent>) -> Self {
        Self {
            events,
            error: None,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl TradePort for MockTradePort {
    fn load_events(&self) -> Result<Vec<TradeEvent>, ShadowfolioError> {
        if let Some(reason) = &self.error {
            return Err(ShadowfolioError::Source {
                reason: reason.clone(),
            });
        }
        Ok(self.events.clone())
    }
}

/// Serves fixed series and records every range requested.
pub struct MockPricePort {
    pub prices: HashMap<String, PricePair>,
    pub splits: HashMap<String, Vec<SplitEvent>>,
    pub errors: HashMap<String, String>,
    pub requests: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            splits: HashMap::new(),
            errors: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Same points for close and adjusted close.
    pub fn with_series(mut self, ticker: &str, points: &[(&str, f64)]) -> Self {
        self.prices.insert(
            ticker.to_string(),
            PricePair {
                close: series(ticker, points),
                adj_close: series(ticker, points),
            },
        );
        self
    }

    pub fn with_pair(mut self, ticker: &str, pair: PricePair) -> Self {
        self.prices.insert(ticker.to_string(), pair);
        self
    }

    pub fn with_splits(mut self, ticker: &str, splits: Vec<SplitEvent>) -> Self {
        self.splits.insert(ticker.to_string(), splits);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PricePair, ShadowfolioError> {
        self.requests
            .borrow_mut()
            .push((ticker.to_string(), start, end));
        if let Some(reason) = self.errors.get(ticker) {
            return Err(ShadowfolioError::Source {
                reason: reason.clone(),
            });
        }
        self.prices
            .get(ticker)
            .cloned()
            .ok_or_else(|| ShadowfolioError::Source {
                reason: format!("no prices for {ticker}"),
            })
    }

    fn fetch_splits(&self, ticker: &str) -> Result<Vec<SplitEvent>, ShadowfolioError> {
        Ok(self.splits.get(ticker).cloned().unwrap_or_default())
    }
}

/// Write `content` to `name` inside `dir`, creating parent directories.
pub fn write_file(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}
