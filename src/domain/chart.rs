//! Chart-ready transforms of a computed series.

use serde::Serialize;

use super::compute::{ComputedSeries, SeriesPoint};
use super::ledger::SHARE_EPSILON;

/// How the comparison is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// Raw market values of both legs.
    #[default]
    Amount,
    /// Portfolio relative to benchmark, in percent.
    Percent,
    /// Portfolio minus benchmark, in currency.
    Excess,
}

impl std::str::FromStr for ValueMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amount" => Ok(ValueMode::Amount),
            "percent" => Ok(ValueMode::Percent),
            "excess" => Ok(ValueMode::Excess),
            other => Err(format!(
                "unknown value mode {other:?} (expected amount, percent or excess)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLine {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

pub fn chart_lines(series: &ComputedSeries, mode: ValueMode) -> Vec<ChartLine> {
    let pairs = series.portfolio.iter().zip(&series.benchmark);
    match mode {
        ValueMode::Amount => vec![
            ChartLine {
                name: "portfolio".into(),
                points: series.portfolio.clone(),
            },
            ChartLine {
                name: "benchmark".into(),
                points: series.benchmark.clone(),
            },
        ],
        ValueMode::Excess => vec![ChartLine {
            name: "excess".into(),
            points: pairs
                .map(|(p, b)| SeriesPoint {
                    ts_ms: p.ts_ms,
                    value: p.value - b.value,
                })
                .collect(),
        }],
        // Days with no benchmark exposure have no meaningful ratio.
        ValueMode::Percent => vec![ChartLine {
            name: "excess_pct".into(),
            points: pairs
                .filter(|(_, b)| b.value > SHARE_EPSILON)
                .map(|(p, b)| SeriesPoint {
                    ts_ms: p.ts_ms,
                    value: (p.value / b.value - 1.0) * 100.0,
                })
                .collect(),
        }],
    }
}
