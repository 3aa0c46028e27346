//! Strict numeric cell parsing.

use super::error::ComputeError;

/// Parse a displayed number such as `1,572.66`.
///
/// Whitespace and thousands separators are stripped. Empty cells, the `--`
/// placeholder and non-finite values are rejected.
pub fn parse_number_strict(raw: &str) -> Result<f64, ComputeError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() || cleaned == "--" {
        return Err(ComputeError::InvalidNumber {
            raw: raw.to_string(),
            reason: "empty cell".into(),
        });
    }
    let value: f64 = cleaned.parse().map_err(|_| ComputeError::InvalidNumber {
        raw: raw.to_string(),
        reason: "not a number".into(),
    })?;
    if !value.is_finite() {
        return Err(ComputeError::InvalidNumber {
            raw: raw.to_string(),
            reason: "not finite".into(),
        });
    }
    Ok(value)
}
