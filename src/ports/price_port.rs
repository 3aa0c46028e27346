//! Daily quote and split source port.

use crate::domain::error::ShadowfolioError;
use crate::domain::price::PricePair;
use crate::domain::split::SplitEvent;
use chrono::NaiveDate;

pub trait PricePort {
    /// Close and adjusted close for `ticker` within `start..=end`. A window
    /// without quotes yields empty series.
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PricePair, ShadowfolioError>;

    /// Known splits for `ticker`, ascending by date. No data is not an error.
    fn fetch_splits(&self, ticker: &str) -> Result<Vec<SplitEvent>, ShadowfolioError>;
}
