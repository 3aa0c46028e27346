//! Per-day computation trace for debug tables.
//!
//! Traces are assembled from values the core has already computed; a sink
//! only observes them and cannot feed anything back into the computation.

use chrono::NaiveDate;
use serde::Serialize;

use super::ledger::HoldingSnapshot;
use super::trade::TradeEvent;

/// A price that was actually used, with backfill provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUsed {
    pub ticker: String,
    pub requested_date: NaiveDate,
    pub used_date: NaiveDate,
    pub backfilled: bool,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTrace {
    pub event: TradeEvent,
    pub resolved_date: NaiveDate,
    pub benchmark_price: f64,
    /// Unsigned `cash / benchmark_price`.
    pub benchmark_delta_shares: f64,
    pub benchmark_shares_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTrace {
    pub day_key: NaiveDate,
    pub resolved_date: NaiveDate,
    pub anchor_shifted: bool,
    /// Events in applied order (buys first).
    pub events: Vec<EventTrace>,
    /// Holdings after the whole bucket was applied.
    pub holdings_after: Vec<HoldingSnapshot>,
    pub portfolio_prices_used: Vec<PriceUsed>,
    pub benchmark_price_used: PriceUsed,
    /// Sum of event cash, regardless of side.
    pub day_cash_total: f64,
    /// Sum of unsigned benchmark share deltas.
    pub benchmark_delta_shares_total: f64,
    pub portfolio_value: f64,
    pub benchmark_shares: f64,
    pub benchmark_value: f64,
    pub ts_ms: i64,
}

impl DayTrace {
    pub fn backfilled_count(&self) -> usize {
        self.portfolio_prices_used
            .iter()
            .chain(std::iter::once(&self.benchmark_price_used))
            .filter(|p| p.backfilled)
            .count()
    }
}

/// Receiver of day traces.
pub trait DayTraceSink {
    fn on_day(&mut self, trace: DayTrace);
}

impl<F: FnMut(DayTrace)> DayTraceSink for F {
    fn on_day(&mut self, trace: DayTrace) {
        self(trace)
    }
}
