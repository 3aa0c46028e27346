//! shadowfolio: values a trade history against a synthetic benchmark that
//! received the same cash flows.
//!
//! Hexagonal architecture: valuation logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`], orchestration in
//! [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
