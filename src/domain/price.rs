//! Price series, at-or-before lookup and anchor date resolution.
//!
//! Lookups only ever walk backward in time, so a valuation can never see a
//! price dated after the day it values. The walk is bounded so a long data
//! gap surfaces as an error instead of a months-old price.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::calendar::shift_trading_days;
use super::error::ComputeError;

pub const DEFAULT_MAX_BACK_TRADING_DAYS: u32 = 7;

/// Daily prices for one ticker, keyed by ET trading day.
///
/// Only days with real data are stored; there is no forward fill.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    pub ticker: String,
    prices: HashMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>) -> Self {
        PriceSeries {
            ticker: ticker.into(),
            prices: HashMap::new(),
        }
    }

    pub fn from_points<I>(ticker: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        PriceSeries {
            ticker: ticker.into(),
            prices: points.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, price: f64) {
        self.prices.insert(date, price);
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.prices.get(&date).copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.prices.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Earliest and latest dates present.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.prices.keys().min()?;
        let max = self.prices.keys().max()?;
        Some((*min, *max))
    }
}

/// Which column of the upstream quote feed values the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceBasis {
    #[default]
    Close,
    AdjClose,
}

impl std::str::FromStr for PriceBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" => Ok(PriceBasis::Close),
            "adj_close" | "adjclose" => Ok(PriceBasis::AdjClose),
            other => Err(format!("unknown price basis {other:?} (expected close or adj_close)")),
        }
    }
}

/// Raw and adjusted closes fetched together so the basis can be switched
/// without refetching. Neither column falls back to the other.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PricePair {
    pub close: PriceSeries,
    pub adj_close: PriceSeries,
}

impl PricePair {
    pub fn select(&self, basis: PriceBasis) -> &PriceSeries {
        match basis {
            PriceBasis::Close => &self.close,
            PriceBasis::AdjClose => &self.adj_close,
        }
    }

    pub fn into_series(self, basis: PriceBasis) -> PriceSeries {
        match basis {
            PriceBasis::Close => self.close,
            PriceBasis::AdjClose => self.adj_close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLookup {
    pub used_date: NaiveDate,
    pub price: f64,
    pub backfilled: bool,
}

/// Price at `date`, or the closest earlier trading day within
/// `max_back_trading_days` steps.
pub fn get_price_at_or_before(
    series: &PriceSeries,
    date: NaiveDate,
    max_back_trading_days: u32,
) -> Result<PriceLookup, ComputeError> {
    if let Some(price) = series.get(date) {
        return Ok(PriceLookup {
            used_date: date,
            price,
            backfilled: false,
        });
    }

    let mut cur = date;
    for _ in 0..max_back_trading_days {
        cur = shift_trading_days(cur, -1);
        if let Some(price) = series.get(cur) {
            debug!(ticker = %series.ticker, requested = %date, used = %cur, "backfilled price");
            return Ok(PriceLookup {
                used_date: cur,
                price,
                backfilled: true,
            });
        }
    }

    Err(ComputeError::PriceMissing {
        ticker: series.ticker.clone(),
        date,
        max_back_trading_days,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorResolution {
    pub resolved_date: NaiveDate,
    pub shifted: bool,
}

/// Map a raw event day onto a day present in the anchor series.
///
/// Probes the day itself, then the previous trading day, then the next one.
/// Brokerage display dates and the benchmark's ET buckets disagree by at most
/// one session around timezone boundaries.
pub fn resolve_date_by_anchor(
    anchor: &PriceSeries,
    date: NaiveDate,
) -> Result<AnchorResolution, ComputeError> {
    if anchor.contains(date) {
        return Ok(AnchorResolution {
            resolved_date: date,
            shifted: false,
        });
    }

    let prev = shift_trading_days(date, -1);
    let next = shift_trading_days(date, 1);
    for candidate in [prev, next] {
        if anchor.contains(candidate) {
            debug!(anchor = %anchor.ticker, raw = %date, resolved = %candidate, "anchor date shifted");
            return Ok(AnchorResolution {
                resolved_date: candidate,
                shifted: true,
            });
        }
    }

    Err(ComputeError::AnchorDateUnresolved {
        anchor: anchor.ticker.clone(),
        date,
        tried: vec![date, prev, next],
    })
}
