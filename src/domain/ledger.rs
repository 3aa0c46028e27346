//! Holdings and synthetic benchmark-share accumulator for one computation.

use std::collections::BTreeMap;

use serde::Serialize;

/// Tolerance for share-count rounding noise, not a business rule.
///
/// Holdings whose magnitude falls below it are dropped, and counts down to
/// `-SHARE_EPSILON` still count as non-negative.
pub const SHARE_EPSILON: f64 = 1e-12;

/// Ticker -> signed share count. Ordered so valuation sums are reproducible.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Holdings {
    shares: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingSnapshot {
    pub ticker: String,
    pub shares: f64,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a share delta and return the resulting count.
    pub fn apply(&mut self, ticker: &str, delta: f64) -> f64 {
        let next = self.get(ticker) + delta;
        if next.abs() < SHARE_EPSILON {
            self.shares.remove(ticker);
        } else {
            self.shares.insert(ticker.to_string(), next);
        }
        next
    }

    pub fn get(&self, ticker: &str) -> f64 {
        self.shares.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.shares.iter().map(|(t, s)| (t.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn snapshot(&self) -> Vec<HoldingSnapshot> {
        self.iter()
            .map(|(ticker, shares)| HoldingSnapshot {
                ticker: ticker.to_string(),
                shares,
            })
            .collect()
    }
}

/// Running state threaded through each day bucket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ledger {
    pub holdings: Holdings,
    pub benchmark_shares: f64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_accumulates() {
        let mut h = Holdings::new();
        assert_eq!(h.apply("AAA", 2.0), 2.0);
        assert_eq!(h.apply("AAA", 0.5), 2.5);
        assert_eq!(h.get("AAA"), 2.5);
        assert_eq!(h.get("BBB"), 0.0);
    }

    #[test]
    fn near_zero_entries_are_removed() {
        let mut h = Holdings::new();
        h.apply("AAA", 0.3);
        h.apply("AAA", 0.1 + 0.2 - 0.6);
        // 0.3 + (0.1 + 0.2 - 0.6) leaves float dust well below epsilon.
        assert!(h.is_empty());
        assert_eq!(h.get("AAA"), 0.0);
    }

    #[test]
    fn negative_counts_are_kept_for_the_caller_to_reject() {
        let mut h = Holdings::new();
        h.apply("AAA", 1.0);
        assert_eq!(h.apply("AAA", -2.0), -1.0);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn snapshot_is_ticker_ordered() {
        let mut h = Holdings::new();
        h.apply("ZZZ", 1.0);
        h.apply("AAA", 2.0);
        let snap = h.snapshot();
        assert_eq!(snap[0].ticker, "AAA");
        assert_eq!(snap[1].ticker, "ZZZ");
    }
}
