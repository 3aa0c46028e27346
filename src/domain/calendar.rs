//! Trading-day arithmetic over ET date keys.
//!
//! Only weekends are treated as non-trading days. Market holidays are not
//! modeled; a holiday missing from the anchor series is absorbed by the
//! anchor date probe in [`super::price::resolve_date_by_anchor`].

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use super::error::ComputeError;

static DISPLAY_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\D+(\d{1,2})\D+(\d{1,2})").expect("valid regex"));

/// Parse a strict `YYYY-MM-DD` key.
pub fn parse_iso_date(input: &str) -> Result<NaiveDate, ComputeError> {
    let bytes = input.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return Err(invalid_date(input));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| invalid_date(input))
}

/// Normalize a brokerage display date (`2024/12/30`, `2024-1-2`, `2024年1月2日`)
/// into a trading-day key.
pub fn parse_trade_date(display: &str) -> Result<NaiveDate, ComputeError> {
    let caps = DISPLAY_DATE
        .captures(display)
        .ok_or_else(|| invalid_date(display))?;
    let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
    let year: i32 = field(1).parse().map_err(|_| invalid_date(display))?;
    let month: u32 = field(2).parse().map_err(|_| invalid_date(display))?;
    let day: u32 = field(3).parse().map_err(|_| invalid_date(display))?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid_date(display))
}

/// UTC-midnight timestamp in milliseconds.
pub fn timestamp_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub fn iso_date_to_timestamp(input: &str) -> Result<i64, ComputeError> {
    parse_iso_date(input).map(timestamp_ms)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Move `delta` weekday steps away from `date`, skipping weekends.
///
/// The start date itself is never counted, so shifting a Saturday by +1
/// lands on Monday and by -1 on Friday.
pub fn shift_trading_days(date: NaiveDate, delta: i32) -> NaiveDate {
    let mut remaining = delta.unsigned_abs();
    let mut cur = date;
    while remaining > 0 {
        cur = if delta > 0 {
            cur + Days::new(1)
        } else {
            cur - Days::new(1)
        };
        if is_weekend(cur) {
            continue;
        }
        remaining -= 1;
    }
    cur
}

fn invalid_date(input: &str) -> ComputeError {
    ComputeError::InvalidDate {
        input: input.to_string(),
    }
}
