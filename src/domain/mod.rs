//! Core valuation types and logic.

pub mod calendar;
pub mod number;
pub mod trade;
pub mod price;
pub mod split;
pub mod ledger;
pub mod trace;
pub mod compute;
pub mod chart;
pub mod pipeline;
pub mod config_validation;
pub mod error;
