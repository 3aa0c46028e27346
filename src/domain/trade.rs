//! Trade events as parsed from the brokerage history.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    /// Same-day application order: buys first.
    pub fn apply_order(&self) -> u8 {
        match self {
            TradeType::Buy => 0,
            TradeType::Sell => 1,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            TradeType::Buy => 1.0,
            TradeType::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeType::Buy => write!(f, "BUY"),
            TradeType::Sell => write!(f, "SELL"),
        }
    }
}

/// Audit record left by split normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitAdjustment {
    pub from_shares: f64,
    pub factor: f64,
    /// `"2021-07-20 x4"` entries in ascending date order.
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeEvent {
    pub trade_type: TradeType,
    /// Date exactly as the brokerage displayed it.
    pub trade_date_display: String,
    /// Unresolved ET trading-day key derived from the display date.
    pub iso_date_et: NaiveDate,
    pub ticker: String,
    pub shares: f64,
    /// BUY: invested cost. SELL: settlement proceeds.
    pub cash: f64,
    pub source_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_adjustment: Option<SplitAdjustment>,
}

impl TradeEvent {
    pub fn new(
        trade_type: TradeType,
        trade_date_display: impl Into<String>,
        iso_date_et: NaiveDate,
        ticker: impl Into<String>,
        shares: f64,
        cash: f64,
    ) -> Self {
        TradeEvent {
            trade_type,
            trade_date_display: trade_date_display.into(),
            iso_date_et,
            ticker: ticker.into(),
            shares,
            cash,
            source_year: iso_date_et.year(),
            split_adjustment: None,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.trade_type == TradeType::Buy
    }
}

/// Drop exact repeats of (type, date, ticker, shares, cash), keeping the first.
///
/// Overlapping history pages report the same fill more than once.
pub fn dedupe_events(events: Vec<TradeEvent>) -> Vec<TradeEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| {
            seen.insert((
                e.trade_type,
                e.iso_date_et,
                e.ticker.clone(),
                e.shares.to_bits(),
                e.cash.to_bits(),
            ))
        })
        .collect()
}
