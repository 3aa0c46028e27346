//! Split normalization of BUY share counts.
//!
//! Restates each BUY on the current share basis by multiplying in every split
//! dated strictly after the trade. A split on the trade date itself is left
//! out: whether the fill happened before or after it that day is unknown.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::error::ComputeError;
use super::number::parse_number_strict;
use super::trade::{SplitAdjustment, TradeEvent};

/// One old share became `factor` new shares on `iso_date_et`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitEvent {
    pub iso_date_et: NaiveDate,
    pub factor: f64,
}

/// Parse `"4:1"` (numerator:denominator) or a bare factor such as `"1.5"`.
pub fn parse_split_ratio(raw: &str) -> Result<f64, ComputeError> {
    let factor = match raw.split_once(':') {
        Some((num, den)) => parse_number_strict(num)? / parse_number_strict(den)?,
        None => parse_number_strict(raw)?,
    };
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ComputeError::InvalidNumber {
            raw: raw.to_string(),
            reason: "split factor must be positive".into(),
        });
    }
    Ok(factor)
}

pub fn normalize_buy_events_by_splits(
    events: &[TradeEvent],
    splits_by_ticker: &HashMap<String, Vec<SplitEvent>>,
) -> Vec<TradeEvent> {
    events
        .iter()
        .map(|e| normalize_event(e, splits_by_ticker))
        .collect()
}

fn normalize_event(
    event: &TradeEvent,
    splits_by_ticker: &HashMap<String, Vec<SplitEvent>>,
) -> TradeEvent {
    if !event.is_buy() {
        return event.clone();
    }
    let Some(splits) = splits_by_ticker.get(&event.ticker) else {
        return event.clone();
    };

    let mut applied: Vec<&SplitEvent> = splits
        .iter()
        .filter(|s| s.iso_date_et > event.iso_date_et)
        .collect();
    applied.sort_by_key(|s| s.iso_date_et);

    let factor: f64 = applied.iter().map(|s| s.factor).product();
    if !factor.is_finite() || factor <= 0.0 || factor == 1.0 {
        return event.clone();
    }

    // The audit record keeps the original share count even when the event
    // was already normalized, so a second pass stays a no-op.
    let from_shares = event
        .split_adjustment
        .as_ref()
        .map_or(event.shares, |adj| adj.from_shares);

    TradeEvent {
        shares: from_shares * factor,
        split_adjustment: Some(SplitAdjustment {
            from_shares,
            factor,
            chain: applied
                .iter()
                .map(|s| format!("{} x{}", s.iso_date_et, s.factor))
                .collect(),
        }),
        ..event.clone()
    }
}
