//! Portfolio vs synthetic benchmark valuation.
//!
//! Events are grouped into day buckets in ascending date order. For each
//! bucket the raw day is resolved against the anchor series, events are
//! applied buys-first to the holdings ledger, every event's cash is converted
//! into benchmark shares at the anchor price, and both legs are valued at the
//! resolved date with backward-only price lookup.
//!
//! Plain and traced runs share [`compute_with_sink`]; the only difference is
//! whether trace records are assembled from the values already computed.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::calendar::timestamp_ms;
use super::error::ComputeError;
use super::ledger::{Ledger, SHARE_EPSILON};
use super::price::{
    get_price_at_or_before, resolve_date_by_anchor, PriceSeries, DEFAULT_MAX_BACK_TRADING_DAYS,
};
use super::trace::{DayTrace, DayTraceSink, EventTrace, PriceUsed};
use super::trade::{TradeEvent, TradeType};

pub const DEFAULT_ANCHOR_TICKER: &str = "VTI";

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeOptions {
    pub max_back_trading_days: u32,
    pub anchor_ticker: String,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        ComputeOptions {
            max_back_trading_days: DEFAULT_MAX_BACK_TRADING_DAYS,
            anchor_ticker: DEFAULT_ANCHOR_TICKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub ts_ms: i64,
    pub value: f64,
}

/// Index-aligned output: one entry per distinct resolved trading day.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComputedSeries {
    pub resolved_iso_dates_et: Vec<NaiveDate>,
    pub portfolio: Vec<SeriesPoint>,
    pub benchmark: Vec<SeriesPoint>,
}

impl ComputedSeries {
    pub fn len(&self) -> usize {
        self.resolved_iso_dates_et.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved_iso_dates_et.is_empty()
    }

    fn record(&mut self, day: &DayOutcome) {
        let portfolio = SeriesPoint {
            ts_ms: day.ts_ms,
            value: day.portfolio_value,
        };
        let benchmark = SeriesPoint {
            ts_ms: day.ts_ms,
            value: day.benchmark_value,
        };
        // Two raw days can land on the same anchor day. The later bucket sees
        // the ledger after both, so it supersedes the earlier point. Only
        // weekend-dated anchor rows could resolve backwards; those fold into
        // the latest point as well to keep dates strictly increasing.
        match self.resolved_iso_dates_et.last() {
            Some(last) if day.resolved_date <= *last => {
                let i = self.len() - 1;
                self.portfolio[i].value = portfolio.value;
                self.benchmark[i].value = benchmark.value;
            }
            _ => {
                self.resolved_iso_dates_et.push(day.resolved_date);
                self.portfolio.push(portfolio);
                self.benchmark.push(benchmark);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracedSeries {
    #[serde(flatten)]
    pub series: ComputedSeries,
    pub traces: Vec<DayTrace>,
}

/// Events sharing one raw trade day, already in application order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub day_key: NaiveDate,
    pub events: Vec<TradeEvent>,
}

/// Group events by raw day (ascending) and order each day buys-first.
///
/// Both sorts are stable, so same-day events of one side keep their input
/// order. Selling first could trip the negative-holding check on a day that
/// also rebuys, and benchmark share conversion is path dependent.
pub fn group_into_day_buckets(events: &[TradeEvent]) -> Vec<DayBucket> {
    let mut by_day: BTreeMap<NaiveDate, Vec<TradeEvent>> = BTreeMap::new();
    for e in events {
        by_day.entry(e.iso_date_et).or_default().push(e.clone());
    }
    by_day
        .into_iter()
        .map(|(day_key, mut events)| {
            events.sort_by_key(|e| e.trade_type.apply_order());
            DayBucket { day_key, events }
        })
        .collect()
}

/// Read-only price inputs for one computation.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub prices: &'a HashMap<String, PriceSeries>,
    pub anchor: &'a PriceSeries,
    pub max_back_trading_days: u32,
}

impl<'a> PricingContext<'a> {
    pub fn new(
        prices: &'a HashMap<String, PriceSeries>,
        options: &ComputeOptions,
    ) -> Result<Self, ComputeError> {
        let anchor = prices
            .get(&options.anchor_ticker)
            .ok_or_else(|| ComputeError::MissingAnchor {
                anchor: options.anchor_ticker.clone(),
            })?;
        Ok(PricingContext {
            prices,
            anchor,
            max_back_trading_days: options.max_back_trading_days,
        })
    }

    fn lookup(&self, series: &PriceSeries, date: NaiveDate) -> Result<PriceUsed, ComputeError> {
        let hit = get_price_at_or_before(series, date, self.max_back_trading_days)?;
        Ok(PriceUsed {
            ticker: series.ticker.clone(),
            requested_date: date,
            used_date: hit.used_date,
            backfilled: hit.backfilled,
            price: hit.price,
        })
    }
}

/// Values produced by one day bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct DayOutcome {
    pub resolved_date: NaiveDate,
    pub ts_ms: i64,
    pub portfolio_value: f64,
    pub benchmark_value: f64,
    pub trace: Option<DayTrace>,
}

/// Advance `ledger` through one day bucket and value both legs.
pub fn apply_day(
    ledger: &mut Ledger,
    bucket: &DayBucket,
    ctx: &PricingContext<'_>,
    want_trace: bool,
) -> Result<DayOutcome, ComputeError> {
    let resolution = resolve_date_by_anchor(ctx.anchor, bucket.day_key)?;
    let resolved_date = resolution.resolved_date;

    for event in &bucket.events {
        let after = ledger
            .holdings
            .apply(&event.ticker, event.trade_type.sign() * event.shares);
        if after < -SHARE_EPSILON {
            return Err(ComputeError::NegativeHolding {
                ticker: event.ticker.clone(),
                holding: after,
                day_key: bucket.day_key,
                resolved_date,
                event: Box::new(event.clone()),
            });
        }
    }

    let benchmark_price_used = ctx.lookup(ctx.anchor, resolved_date)?;
    let benchmark_price = benchmark_price_used.price;

    let mut day_cash_total = 0.0;
    let mut benchmark_delta_shares_total = 0.0;
    let mut event_traces = Vec::new();
    for event in &bucket.events {
        day_cash_total += event.cash;
        let delta = event.cash / benchmark_price;
        benchmark_delta_shares_total += delta;
        ledger.benchmark_shares += match event.trade_type {
            TradeType::Buy => delta,
            TradeType::Sell => -delta,
        };
        if ledger.benchmark_shares < -SHARE_EPSILON {
            return Err(ComputeError::NegativeBenchmarkShares {
                shares: ledger.benchmark_shares,
                day_key: bucket.day_key,
                resolved_date,
                event: Box::new(event.clone()),
            });
        }
        if want_trace {
            event_traces.push(EventTrace {
                event: event.clone(),
                resolved_date,
                benchmark_price,
                benchmark_delta_shares: delta,
                benchmark_shares_after: ledger.benchmark_shares,
            });
        }
    }

    let mut portfolio_value = 0.0;
    let mut portfolio_prices_used = Vec::new();
    for (ticker, shares) in ledger.holdings.iter() {
        let series = ctx
            .prices
            .get(ticker)
            .ok_or_else(|| ComputeError::MissingPriceSeries {
                ticker: ticker.to_string(),
                day_key: bucket.day_key,
                resolved_date,
            })?;
        let used = ctx.lookup(series, resolved_date)?;
        portfolio_value += shares * used.price;
        if want_trace {
            portfolio_prices_used.push(used);
        }
    }

    let benchmark_value = ledger.benchmark_shares * benchmark_price;
    let ts_ms = timestamp_ms(resolved_date);

    debug!(
        day = %bucket.day_key,
        resolved = %resolved_date,
        events = bucket.events.len(),
        portfolio_value,
        benchmark_value,
        "day computed"
    );

    let trace = want_trace.then(|| DayTrace {
        day_key: bucket.day_key,
        resolved_date,
        anchor_shifted: resolution.shifted,
        events: event_traces,
        holdings_after: ledger.holdings.snapshot(),
        portfolio_prices_used,
        benchmark_price_used,
        day_cash_total,
        benchmark_delta_shares_total,
        portfolio_value,
        benchmark_shares: ledger.benchmark_shares,
        benchmark_value,
        ts_ms,
    });

    Ok(DayOutcome {
        resolved_date,
        ts_ms,
        portfolio_value,
        benchmark_value,
        trace,
    })
}

/// The single computation path. `sink` only decides whether traces are built.
pub fn compute_with_sink(
    events: &[TradeEvent],
    prices: &HashMap<String, PriceSeries>,
    options: &ComputeOptions,
    mut sink: Option<&mut dyn DayTraceSink>,
) -> Result<ComputedSeries, ComputeError> {
    let ctx = PricingContext::new(prices, options)?;
    let want_trace = sink.is_some();

    let mut ledger = Ledger::new();
    let mut out = ComputedSeries::default();
    for bucket in group_into_day_buckets(events) {
        let day = apply_day(&mut ledger, &bucket, &ctx, want_trace)?;
        out.record(&day);
        if let (Some(sink), Some(trace)) = (sink.as_deref_mut(), day.trace) {
            sink.on_day(trace);
        }
    }
    Ok(out)
}

pub fn compute(
    events: &[TradeEvent],
    prices: &HashMap<String, PriceSeries>,
    options: &ComputeOptions,
) -> Result<ComputedSeries, ComputeError> {
    compute_with_sink(events, prices, options, None)
}

/// Same values as [`compute`], plus one [`DayTrace`] per day bucket.
///
/// `on_day` sees each trace as it is produced; all traces are also returned.
pub fn compute_with_trace(
    events: &[TradeEvent],
    prices: &HashMap<String, PriceSeries>,
    options: &ComputeOptions,
    mut on_day: impl FnMut(&DayTrace),
) -> Result<TracedSeries, ComputeError> {
    let mut traces = Vec::new();
    let mut collect = |trace: DayTrace| {
        on_day(&trace);
        traces.push(trace);
    };
    let series = compute_with_sink(
        events,
        prices,
        options,
        Some(&mut collect as &mut dyn DayTraceSink),
    )?;
    Ok(TracedSeries { series, traces })
}
