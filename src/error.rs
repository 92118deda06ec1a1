use thiserror::Error;

/// Failures of one valuation run.
///
/// Every variant carries the values needed to explain the failure; callers
/// decide how to phrase it for users.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// Target (or a hand-built record) is malformed. Raised before any fitting.
    #[error("invalid input for {subject}: {reason}")]
    InvalidInput { subject: String, reason: String },

    /// Attribute schema cannot be used for extraction or fitting.
    #[error("invalid attribute schema for '{attribute}': {reason}")]
    InvalidSchema { attribute: String, reason: String },

    /// Not enough comparables survived filtering.
    #[error("insufficient comparable data: found {found} usable records, need at least {required} for {dimensionality} attributes")]
    InsufficientData {
        found: usize,
        required: usize,
        dimensionality: usize,
    },

    /// Attribute vector width does not match the run's schema.
    #[error("attribute dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Design matrix is not full column rank.
    #[error("ill-conditioned model: attribute '{attribute}' is collinear with the other columns ({observations} observations, {columns} columns)")]
    IllConditionedModel {
        attribute: String,
        observations: usize,
        columns: usize,
    },

    /// Predicted fair price is zero, negative or not finite.
    #[error("degenerate fair value {fair_price}: deviation is undefined")]
    DegenerateFairValue { fair_price: f64 },
}
