//! Hedonic price regression.
//!
//! Fits `price ≈ intercept + Σ βᵢ · attributeᵢ` over a comparable set by
//! ordinary least squares. The fitted βᵢ are the shadow prices: what the
//! market pays for one more unit of each attribute.
//!
//! # Solver
//!
//! Householder QR on the design matrix, followed by back substitution on
//! `R β = Qᵀ y`. A column whose remaining norm after the reflections is
//! negligible relative to its original norm makes the design rank deficient
//! and the fit fails with [`ValuationError::IllConditionedModel`].

use ndarray::{Array1, Array2, s};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AnalysisConfig, CollinearityPolicy, PriceBasis};
use crate::error::ValuationError;
use crate::models::{AttributeVector, ComparableSet};

const RANK_TOLERANCE: f64 = 1e-9;
const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Fitted coefficient for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowPrice {
    pub attribute: String,
    pub value: f64,
}

/// Result of one regression. Immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    shadow_prices: Vec<ShadowPrice>,
    intercept: f64,
    r_squared: f64,
    adjusted_r_squared: f64,
    residual_std_error: f64,
    observations: usize,
    price_basis: PriceBasis,
    unit_index: Option<usize>,
    dropped_attributes: Vec<String>,
}

impl FittedModel {
    /// Shadow prices in schema order. Dropped attributes report zero.
    pub fn shadow_prices(&self) -> &[ShadowPrice] {
        &self.shadow_prices
    }

    pub fn coefficient(&self, attribute: &str) -> Option<f64> {
        self.shadow_prices
            .iter()
            .find(|price| price.attribute == attribute)
            .map(|price| price.value)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficient of determination, measured on the regression response.
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn adjusted_r_squared(&self) -> f64 {
        self.adjusted_r_squared
    }

    pub fn residual_std_error(&self) -> f64 {
        self.residual_std_error
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn price_basis(&self) -> PriceBasis {
        self.price_basis
    }

    pub fn unit_index(&self) -> Option<usize> {
        self.unit_index
    }

    pub fn dropped_attributes(&self) -> &[String] {
        &self.dropped_attributes
    }

    pub fn dimensionality(&self) -> usize {
        self.shadow_prices.len()
    }

    /// `intercept + Σ coefficientᵢ · attributeᵢ`, in the units of the
    /// regression response (price per unit under [`PriceBasis::PerUnit`]).
    pub fn predict(&self, attributes: &AttributeVector) -> Result<f64, ValuationError> {
        if attributes.len() != self.dimensionality() {
            return Err(ValuationError::DimensionMismatch {
                expected: self.dimensionality(),
                found: attributes.len(),
            });
        }

        Ok(self.intercept
            + self
                .shadow_prices
                .iter()
                .zip(attributes.as_slice())
                .map(|(price, value)| price.value * value)
                .sum::<f64>())
    }
}

/// Fits [`FittedModel`]s under one price basis and collinearity policy.
#[derive(Debug, Clone)]
pub struct HedonicRegression {
    price_basis: PriceBasis,
    collinearity: CollinearityPolicy,
    unit_index: Option<usize>,
}

impl HedonicRegression {
    pub fn new(
        price_basis: PriceBasis,
        collinearity: CollinearityPolicy,
        unit_index: Option<usize>,
    ) -> Self {
        HedonicRegression {
            price_basis,
            collinearity,
            unit_index,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.analysis.price_basis,
            config.analysis.collinearity,
            config.unit_count_index(),
        )
    }

    pub fn fit(&self, set: &ComparableSet) -> Result<FittedModel, ValuationError> {
        let names = set.attribute_names();
        let dimensionality = set.dimensionality();
        let observations = set.len();

        let unit_index = match (self.price_basis, self.unit_index) {
            (PriceBasis::PerUnit, Some(index)) if index < dimensionality => Some(index),
            (PriceBasis::PerUnit, _) => {
                return Err(ValuationError::InvalidSchema {
                    attribute: "<schema>".to_string(),
                    reason: "per_unit price basis needs a unit_count attribute".to_string(),
                });
            }
            (PriceBasis::Total, index) => index.filter(|index| *index < dimensionality),
        };

        let response = self.response(set, unit_index)?;

        let kept: Vec<usize> = (0..dimensionality)
            .filter(|&column| {
                self.collinearity == CollinearityPolicy::Fail || !is_constant(set, column)
            })
            .collect();
        let dropped_attributes: Vec<String> = (0..dimensionality)
            .filter(|column| !kept.contains(column))
            .map(|column| names[column].clone())
            .collect();

        if !dropped_attributes.is_empty() {
            info!(
                "Dropping constant attributes from the regression: {:?}",
                dropped_attributes
            );
        }

        let mut design = Array2::<f64>::ones((observations, kept.len() + 1));
        for (row, record) in set.records().iter().enumerate() {
            let values = record.attributes().as_slice();
            for (position, &column) in kept.iter().enumerate() {
                design[[row, position + 1]] = values[column];
            }
        }

        let beta = solve_least_squares(&design, &response).map_err(|column| {
            let attribute = match column {
                0 => "intercept".to_string(),
                position => names[kept[position - 1]].clone(),
            };
            ValuationError::IllConditionedModel {
                attribute,
                observations,
                columns: kept.len() + 1,
            }
        })?;

        let mut coefficients = vec![0.0; dimensionality];
        for (position, &column) in kept.iter().enumerate() {
            coefficients[column] = beta[position + 1];
        }

        let fitted = design.dot(&beta);
        let residual_ss: f64 = (&response - &fitted).mapv(|r| r * r).sum();
        let mean = response.mean().unwrap_or(0.0);
        let total_ss: f64 = response.mapv(|y| (y - mean) * (y - mean)).sum();

        let r_squared = if total_ss <= f64::EPSILON * observations as f64 {
            1.0
        } else {
            1.0 - residual_ss / total_ss
        };

        // The set-size floor guarantees at least one residual degree of freedom
        let degrees_of_freedom = observations.saturating_sub(kept.len() + 1).max(1) as f64;
        let adjusted_r_squared =
            1.0 - (1.0 - r_squared) * (observations as f64 - 1.0) / degrees_of_freedom;
        let residual_std_error = (residual_ss / degrees_of_freedom).sqrt();

        debug!(
            "Fitted hedonic model on {} observations: intercept={}, coefficients={:?}, r2={}",
            observations, beta[0], coefficients, r_squared
        );

        Ok(FittedModel {
            shadow_prices: names
                .iter()
                .zip(coefficients)
                .map(|(attribute, value)| ShadowPrice {
                    attribute: attribute.clone(),
                    value,
                })
                .collect(),
            intercept: beta[0],
            r_squared,
            adjusted_r_squared,
            residual_std_error,
            observations,
            price_basis: self.price_basis,
            unit_index,
            dropped_attributes,
        })
    }

    fn response(
        &self,
        set: &ComparableSet,
        unit_index: Option<usize>,
    ) -> Result<Array1<f64>, ValuationError> {
        let mut response = Array1::<f64>::zeros(set.len());

        for (row, record) in set.records().iter().enumerate() {
            response[row] = match (self.price_basis, unit_index) {
                (PriceBasis::PerUnit, Some(index)) => {
                    let units = record.attributes().get(index).unwrap_or(0.0);
                    if units <= 0.0 {
                        return Err(ValuationError::InvalidInput {
                            subject: format!("comparable '{}'", record.id()),
                            reason: format!("unit count must be positive, got {}", units),
                        });
                    }
                    record.price() / units
                }
                _ => record.price(),
            };
        }

        Ok(response)
    }
}

fn is_constant(set: &ComparableSet, column: usize) -> bool {
    let mut values = set
        .records()
        .iter()
        .filter_map(|record| record.attributes().get(column));

    let Some(first) = values.next() else {
        return true;
    };

    let (min, max) = values.fold((first, first), |(min, max), value| {
        (min.min(value), max.max(value))
    });

    max - min <= CONSTANT_TOLERANCE * max.abs().max(1.0)
}

/// Least squares via Householder QR. On rank deficiency returns the index of
/// the first design column that is (numerically) a combination of the
/// columns before it.
fn solve_least_squares(design: &Array2<f64>, response: &Array1<f64>) -> Result<Array1<f64>, usize> {
    let (_, columns) = design.dim();
    let mut r = design.clone();
    let mut qty = response.clone();

    for k in 0..columns {
        let original = design.column(k);
        let column_norm = original.dot(&original).sqrt();

        let mut v = r.slice(s![k.., k]).to_owned();
        let norm = v.dot(&v).sqrt();
        if column_norm == 0.0 || norm <= RANK_TOLERANCE * column_norm {
            return Err(k);
        }

        let alpha = if v[0] > 0.0 { -norm } else { norm };
        v[0] -= alpha;
        let v_norm_sq = v.dot(&v);

        for j in k..columns {
            let factor = 2.0 * v.dot(&r.slice(s![k.., j])) / v_norm_sq;
            r.slice_mut(s![k.., j]).scaled_add(-factor, &v);
        }
        let factor = 2.0 * v.dot(&qty.slice(s![k..])) / v_norm_sq;
        qty.slice_mut(s![k..]).scaled_add(-factor, &v);
    }

    let mut beta = Array1::<f64>::zeros(columns);
    for i in (0..columns).rev() {
        let mut acc = qty[i];
        for j in (i + 1)..columns {
            acc -= r[[i, j]] * beta[j];
        }
        beta[i] = acc / r[[i, i]];
    }

    Ok(beta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComparableRecord;

    fn set_of(rows: &[(f64, [f64; 2])]) -> ComparableSet {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, (price, attrs))| {
                ComparableRecord::new(format!("c{}", i), *price, attrs.to_vec().into()).unwrap()
            })
            .collect();
        ComparableSet::new(vec!["mg".to_string(), "count".to_string()], records).unwrap()
    }

    fn total() -> HedonicRegression {
        HedonicRegression::new(PriceBasis::Total, CollinearityPolicy::Fail, Some(1))
    }

    fn per_unit() -> HedonicRegression {
        HedonicRegression::new(PriceBasis::PerUnit, CollinearityPolicy::Fail, Some(1))
    }

    const GRID: [[f64; 2]; 6] = [
        [100.0, 60.0],
        [200.0, 60.0],
        [400.0, 90.0],
        [200.0, 120.0],
        [100.0, 240.0],
        [400.0, 240.0],
    ];

    #[test]
    fn test_recovers_exact_linear_prices() {
        let rows: Vec<(f64, [f64; 2])> = GRID
            .iter()
            .map(|attrs| (8.0 + 0.05 * attrs[0] + 0.03 * attrs[1], *attrs))
            .collect();

        let model = total().fit(&set_of(&rows)).unwrap();

        assert!((model.intercept() - 8.0).abs() < 1e-6);
        assert!((model.coefficient("mg").unwrap() - 0.05).abs() < 1e-6);
        assert!((model.coefficient("count").unwrap() - 0.03).abs() < 1e-6);
        assert!((model.r_squared() - 1.0).abs() < 1e-9);
        assert!(model.residual_std_error() < 1e-6);
        assert_eq!(model.observations(), 6);
    }

    #[test]
    fn test_recovers_exact_per_unit_prices() {
        let rows: Vec<(f64, [f64; 2])> = GRID
            .iter()
            .map(|attrs| ((0.05 + 0.0004 * attrs[0] - 0.0001 * attrs[1]) * attrs[1], *attrs))
            .collect();

        let model = per_unit().fit(&set_of(&rows)).unwrap();

        assert!((model.intercept() - 0.05).abs() < 1e-6);
        assert!((model.coefficient("mg").unwrap() - 0.0004).abs() < 1e-6);
        assert!((model.coefficient("count").unwrap() + 0.0001).abs() < 1e-6);
        assert_eq!(model.price_basis(), PriceBasis::PerUnit);
        assert_eq!(model.unit_index(), Some(1));
    }

    #[test]
    fn test_reference_market_fit() {
        let set = set_of(&[
            (10.0, [100.0, 60.0]),
            (15.0, [200.0, 60.0]),
            (20.0, [200.0, 120.0]),
            (12.5, [150.0, 90.0]),
        ]);

        let model = total().fit(&set).unwrap();

        assert!((model.intercept() + 5.0 / 6.0).abs() < 1e-9);
        assert!((model.coefficient("mg").unwrap() - 7.0 / 120.0).abs() < 1e-9);
        assert!((model.coefficient("count").unwrap() - 5.0 / 72.0).abs() < 1e-9);
        assert!((model.r_squared() - 0.9238095238095239).abs() < 1e-9);

        let prediction = model.predict(&vec![200.0, 60.0].into()).unwrap();
        assert!((prediction - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_attributes_fail() {
        let rows: Vec<(f64, [f64; 2])> = [100.0, 150.0, 200.0, 300.0]
            .iter()
            .map(|mg| (mg * 0.1, [*mg, mg / 2.0]))
            .collect();

        let err = total().fit(&set_of(&rows)).unwrap_err();
        assert_eq!(
            err,
            ValuationError::IllConditionedModel {
                attribute: "count".to_string(),
                observations: 4,
                columns: 3
            }
        );
    }

    #[test]
    fn test_constant_attribute_policy() {
        let rows = [
            (10.0, [100.0, 60.0]),
            (15.0, [200.0, 60.0]),
            (25.0, [400.0, 60.0]),
            (20.0, [300.0, 60.0]),
        ];

        let err = total().fit(&set_of(&rows)).unwrap_err();
        assert!(matches!(
            err,
            ValuationError::IllConditionedModel { ref attribute, .. } if attribute == "count"
        ));

        let dropping = HedonicRegression::new(PriceBasis::Total, CollinearityPolicy::DropConstant, Some(1));
        let model = dropping.fit(&set_of(&rows)).unwrap();

        assert_eq!(model.dropped_attributes(), &["count".to_string()]);
        assert_eq!(model.coefficient("count"), Some(0.0));
        assert!((model.coefficient("mg").unwrap() - 0.05).abs() < 1e-9);
        assert!((model.intercept() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_unit_requires_unit_index() {
        let set = set_of(&[
            (10.0, [100.0, 60.0]),
            (15.0, [200.0, 60.0]),
            (20.0, [200.0, 120.0]),
            (12.5, [150.0, 90.0]),
        ]);
        let regression = HedonicRegression::new(PriceBasis::PerUnit, CollinearityPolicy::Fail, None);

        assert!(matches!(
            regression.fit(&set),
            Err(ValuationError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_predict_checks_dimensions() {
        let set = set_of(&[
            (10.0, [100.0, 60.0]),
            (15.0, [200.0, 60.0]),
            (20.0, [200.0, 120.0]),
            (12.5, [150.0, 90.0]),
        ]);
        let model = total().fit(&set).unwrap();

        assert_eq!(
            model.predict(&vec![200.0].into()),
            Err(ValuationError::DimensionMismatch { expected: 2, found: 1 })
        );
    }

    #[test]
    fn test_fit_is_deterministic() {
        let set = set_of(&[
            (10.0, [100.0, 60.0]),
            (15.0, [200.0, 60.0]),
            (20.0, [200.0, 120.0]),
            (12.5, [150.0, 90.0]),
        ]);

        assert_eq!(per_unit().fit(&set).unwrap(), per_unit().fit(&set).unwrap());
    }
}
