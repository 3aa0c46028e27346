//! Trade history source port.

use crate::domain::error::ShadowfolioError;
use crate::domain::trade::TradeEvent;

/// Supplies parsed, validated trade events. Order is not significant.
pub trait TradePort {
    fn load_events(&self) -> Result<Vec<TradeEvent>, ShadowfolioError>;
}
