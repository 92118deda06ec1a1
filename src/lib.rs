//! Hedonic price analysis for retail products.
//!
//! Extracts attribute quantities from listing text, regresses comparable
//! prices on them, and reports how far a target's price sits from the
//! model's fair value.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod processor;
pub mod valuation;

pub use error::ValuationError;
pub use valuation::{HedonicAnalyzer, ValuationResult, Verdict};
