//! Domain error types.
//!
//! [`ComputeError`] is the fail-fast taxonomy of the valuation core. Every
//! variant carries the context needed to locate the offending input.
//! [`ShadowfolioError`] is the application-level error the CLI reports.

use chrono::NaiveDate;

use super::trade::TradeEvent;

/// Machine-readable kind of a [`ComputeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeErrorKind {
    InvalidDate,
    InvalidNumber,
    MissingAnchor,
    AnchorDateUnresolved,
    PriceMissing,
    MissingPriceSeries,
    NegativeHolding,
    NegativeBenchmarkShares,
}

impl ComputeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeErrorKind::InvalidDate => "INVALID_DATE",
            ComputeErrorKind::InvalidNumber => "INVALID_NUMBER",
            ComputeErrorKind::MissingAnchor => "MISSING_ANCHOR",
            ComputeErrorKind::AnchorDateUnresolved => "ANCHOR_DATE_UNRESOLVED",
            ComputeErrorKind::PriceMissing => "PRICE_MISSING",
            ComputeErrorKind::MissingPriceSeries => "MISSING_PRICE_SERIES",
            ComputeErrorKind::NegativeHolding => "NEGATIVE_HOLDING",
            ComputeErrorKind::NegativeBenchmarkShares => "NEGATIVE_BENCHMARK_SHARES",
        }
    }
}

impl std::fmt::Display for ComputeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
    #[error("invalid date: {input:?}")]
    InvalidDate { input: String },

    #[error("invalid number {raw:?}: {reason}")]
    InvalidNumber { raw: String, reason: String },

    #[error("missing anchor price series: {anchor}")]
    MissingAnchor { anchor: String },

    #[error("cannot resolve {date} via anchor {anchor} (tried {tried:?})")]
    AnchorDateUnresolved {
        anchor: String,
        date: NaiveDate,
        tried: Vec<NaiveDate>,
    },

    #[error("missing price for {ticker} at {date} (looked back {max_back_trading_days} trading days)")]
    PriceMissing {
        ticker: String,
        date: NaiveDate,
        max_back_trading_days: u32,
    },

    #[error("missing price series for held ticker {ticker} on {resolved_date}")]
    MissingPriceSeries {
        ticker: String,
        day_key: NaiveDate,
        resolved_date: NaiveDate,
    },

    #[error("negative holding for {ticker}: {holding} shares on {resolved_date}")]
    NegativeHolding {
        ticker: String,
        holding: f64,
        day_key: NaiveDate,
        resolved_date: NaiveDate,
        event: Box<TradeEvent>,
    },

    #[error("benchmark shares would become negative ({shares}) on {resolved_date} via {ticker}", ticker = .event.ticker)]
    NegativeBenchmarkShares {
        shares: f64,
        day_key: NaiveDate,
        resolved_date: NaiveDate,
        event: Box<TradeEvent>,
    },
}

impl ComputeError {
    pub fn kind(&self) -> ComputeErrorKind {
        match self {
            ComputeError::InvalidDate { .. } => ComputeErrorKind::InvalidDate,
            ComputeError::InvalidNumber { .. } => ComputeErrorKind::InvalidNumber,
            ComputeError::MissingAnchor { .. } => ComputeErrorKind::MissingAnchor,
            ComputeError::AnchorDateUnresolved { .. } => ComputeErrorKind::AnchorDateUnresolved,
            ComputeError::PriceMissing { .. } => ComputeErrorKind::PriceMissing,
            ComputeError::MissingPriceSeries { .. } => ComputeErrorKind::MissingPriceSeries,
            ComputeError::NegativeHolding { .. } => ComputeErrorKind::NegativeHolding,
            ComputeError::NegativeBenchmarkShares { .. } => {
                ComputeErrorKind::NegativeBenchmarkShares
            }
        }
    }

    /// The ticker the failure is attributable to, when there is exactly one.
    ///
    /// `NegativeBenchmarkShares` is a property of the whole cash-flow stream,
    /// so it names no ticker even though it carries the triggering event.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            ComputeError::PriceMissing { ticker, .. }
            | ComputeError::MissingPriceSeries { ticker, .. }
            | ComputeError::NegativeHolding { ticker, .. } => Some(ticker),
            _ => None,
        }
    }
}

/// Top-level error type for shadowfolio.
#[derive(Debug, thiserror::Error)]
pub enum ShadowfolioError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    Source { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("{kind} {0}", kind = .0.kind())]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShadowfolioError {
    /// Process exit status for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            ShadowfolioError::Io(_) => 1,
            ShadowfolioError::ConfigParse { .. }
            | ShadowfolioError::ConfigMissing { .. }
            | ShadowfolioError::ConfigInvalid { .. } => 2,
            ShadowfolioError::Source { .. } => 3,
            ShadowfolioError::Compute(_) => 4,
            ShadowfolioError::Report { .. } => 5,
        }
    }
}

impl From<&ShadowfolioError> for std::process::ExitCode {
    fn from(err: &ShadowfolioError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
