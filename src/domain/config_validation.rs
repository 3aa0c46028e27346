//! Configuration validation.
//!
//! Validates every config field before any file is read.

use crate::domain::chart::ValueMode;
use crate::domain::error::ShadowfolioError;
use crate::domain::price::PriceBasis;
use crate::ports::config_port::ConfigPort;

/// Upper bound for the backfill window; anything larger hides data gaps.
pub const MAX_BACKFILL_WINDOW: i64 = 60;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), ShadowfolioError> {
    validate_data_paths(config)?;
    validate_anchor(config)?;
    validate_max_back_trading_days(config)?;
    validate_parsed::<PriceBasis>(config, "compute", "price_basis")?;
    for key in ["apply_splits", "buy_only", "skip_failed_tickers"] {
        validate_bool(config, "compute", key)?;
    }
    validate_output(config)?;
    Ok(())
}

fn validate_data_paths(config: &dyn ConfigPort) -> Result<(), ShadowfolioError> {
    for key in ["buys", "prices_dir"] {
        match config.get_string("data", key) {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(ShadowfolioError::ConfigMissing {
                    section: "data".to_string(),
                    key: key.to_string(),
                })
            }
        }
    }
    Ok(())
}

fn validate_anchor(config: &dyn ConfigPort) -> Result<(), ShadowfolioError> {
    match config.get_string("compute", "anchor_ticker") {
        Some(s) if s.trim().is_empty() => Err(ShadowfolioError::ConfigInvalid {
            section: "compute".to_string(),
            key: "anchor_ticker".to_string(),
            reason: "anchor_ticker must not be empty".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_max_back_trading_days(config: &dyn ConfigPort) -> Result<(), ShadowfolioError> {
    let Some(raw) = config.get_string("compute", "max_back_trading_days") else {
        return Ok(());
    };
    let invalid = || ShadowfolioError::ConfigInvalid {
        section: "compute".to_string(),
        key: "max_back_trading_days".to_string(),
        reason: format!("max_back_trading_days must be an integer in 0..={MAX_BACKFILL_WINDOW}"),
    };
    let value: i64 = raw.trim().parse().map_err(|_| invalid())?;
    if !(0..=MAX_BACKFILL_WINDOW).contains(&value) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_output(config: &dyn ConfigPort) -> Result<(), ShadowfolioError> {
    if let Some(format) = config.get_string("output", "format") {
        if !matches!(format.trim().to_lowercase().as_str(), "csv" | "json") {
            return Err(ShadowfolioError::ConfigInvalid {
                section: "output".to_string(),
                key: "format".to_string(),
                reason: "format must be csv or json".to_string(),
            });
        }
    }
    validate_parsed::<ValueMode>(config, "output", "value_mode")
}

fn validate_parsed<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ShadowfolioError>
where
    T: std::str::FromStr<Err = String>,
{
    match config.get_string(section, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(|_| ())
            .map_err(|reason| ShadowfolioError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason,
            }),
        None => Ok(()),
    }
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ShadowfolioError> {
    // A value that parses neither way yields different defaults for the two probes.
    if config.get_string(section, key).is_some()
        && config.get_bool(section, key, true) != config.get_bool(section, key, false)
    {
        return Err(ShadowfolioError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: "expected true/false".to_string(),
        });
    }
    Ok(())
}
