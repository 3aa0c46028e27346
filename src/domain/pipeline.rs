//! Run-level policy around the valuation core: which price ranges to fetch,
//! and how a ticker that cannot be valued is dropped from a run.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::warn;

use super::calendar::shift_trading_days;
use super::compute::{compute_with_trace, ComputeOptions, ComputedSeries};
use super::error::ComputeError;
use super::price::PriceSeries;
use super::trace::DayTrace;
use super::trade::TradeEvent;

/// Inclusive date range to request from a price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Trading-day offset from a first event to the start of its fetch window.
/// Saturates for limits too large to count in an `i32`.
pub fn backfill_lead(max_back_trading_days: u32) -> i32 {
    i32::try_from(max_back_trading_days)
        .map_or(i32::MIN, |n| n.saturating_add(1).saturating_neg())
}

/// One window per ticker, plus the anchor.
///
/// Each ticker starts at its own first event, the anchor at the first event
/// overall. All windows end one trading day past the last event so the
/// anchor's next-day probe has data, and start `max_back + 1` trading days
/// early so a previous-day resolution can still backfill fully.
pub fn plan_fetch_windows(
    events: &[TradeEvent],
    anchor_ticker: &str,
    max_back_trading_days: u32,
) -> BTreeMap<String, FetchWindow> {
    let mut firsts: BTreeMap<String, NaiveDate> = BTreeMap::new();
    for e in events {
        firsts
            .entry(e.ticker.clone())
            .and_modify(|d| *d = (*d).min(e.iso_date_et))
            .or_insert(e.iso_date_et);
    }
    let (Some(global_first), Some(global_last)) = (
        events.iter().map(|e| e.iso_date_et).min(),
        events.iter().map(|e| e.iso_date_et).max(),
    ) else {
        return BTreeMap::new();
    };

    let lead = backfill_lead(max_back_trading_days);
    let end = shift_trading_days(global_last, 1);
    firsts.insert(anchor_ticker.to_string(), global_first);

    firsts
        .into_iter()
        .map(|(ticker, first)| {
            let window = FetchWindow {
                start: shift_trading_days(first, lead),
                end,
            };
            (ticker, window)
        })
        .collect()
}

/// Remove every event of `ticker`, returning how many were removed.
pub fn drop_ticker_events(events: &mut Vec<TradeEvent>, ticker: &str) -> usize {
    let before = events.len();
    events.retain(|e| e.ticker != ticker);
    before - events.len()
}

/// Result of a run that may have dropped tickers along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippingRun {
    pub series: ComputedSeries,
    pub traces: Vec<DayTrace>,
    /// Tickers whose events were removed, in the order they failed.
    pub dropped: Vec<String>,
}

/// Compute, and when `skip_failed` is set and the failure is attributable to
/// a single non-anchor ticker still present in `events`, drop that ticker and
/// start again from an empty ledger.
///
/// Anchor failures and failures naming no ticker are always returned.
pub fn compute_skipping_failed(
    mut events: Vec<TradeEvent>,
    prices: &HashMap<String, PriceSeries>,
    options: &ComputeOptions,
    skip_failed: bool,
) -> Result<SkippingRun, ComputeError> {
    let mut dropped = Vec::new();
    loop {
        let err = match compute_with_trace(&events, prices, options, |_| {}) {
            Ok(traced) => {
                return Ok(SkippingRun {
                    series: traced.series,
                    traces: traced.traces,
                    dropped,
                })
            }
            Err(err) => err,
        };

        let ticker = match err.ticker() {
            Some(t) if skip_failed && t != options.anchor_ticker => t.to_string(),
            _ => return Err(err),
        };
        if drop_ticker_events(&mut events, &ticker) == 0 {
            return Err(err);
        }
        warn!(ticker = %ticker, kind = %err.kind(), error = %err, "dropping ticker and recomputing");
        dropped.push(ticker);
    }
}
