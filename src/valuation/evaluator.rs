use serde::Serialize;
use tracing::debug;

use crate::config::PriceBasis;
use crate::error::ValuationError;
use crate::models::{AttributeVector, TargetProduct};
use crate::valuation::FittedModel;

/// Fair value of the target and how far its observed price sits from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub fair_price: f64,
    pub overprice_pct: f64,
}

/// Values `target` against `model`.
///
/// Under [`PriceBasis::PerUnit`] the model predicts a price per unit, which
/// is scaled back to a shelf price by the target's own unit count.
pub fn evaluate(target: &TargetProduct, model: &FittedModel) -> Result<Evaluation, ValuationError> {
    let fair_price = fair_price(model, &target.attributes)?;

    if !fair_price.is_finite() || fair_price <= 0.0 {
        return Err(ValuationError::DegenerateFairValue { fair_price });
    }

    let overprice_pct = overprice_pct(target.observed_price, fair_price);
    debug!(
        "Valued '{}': observed={}, fair={}, deviation={}%",
        target.name, target.observed_price, fair_price, overprice_pct
    );

    Ok(Evaluation {
        fair_price,
        overprice_pct,
    })
}

/// Model prediction for `attributes`, expressed as a shelf price.
pub fn fair_price(model: &FittedModel, attributes: &AttributeVector) -> Result<f64, ValuationError> {
    let predicted = model.predict(attributes)?;

    Ok(match (model.price_basis(), model.unit_index()) {
        (PriceBasis::PerUnit, Some(index)) => predicted * attributes.get(index).unwrap_or(0.0),
        _ => predicted,
    })
}

/// Signed deviation of `observed` from `fair`, in percent of `fair`.
pub fn overprice_pct(observed: f64, fair: f64) -> f64 {
    (observed - fair) / fair * 100.0
}
