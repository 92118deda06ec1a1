use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ComparableSet, ExtractionDefaulted, TargetProduct};
use crate::valuation::evaluator::{fair_price, overprice_pct};
use crate::valuation::{Evaluation, FittedModel};

/// Coarse reading of the deviation, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Overpriced,
    Fair,
    Bargain,
}

impl Verdict {
    /// Deviations within `± fair_band_pct` count as fair.
    pub fn classify(overprice_pct: f64, fair_band_pct: f64) -> Self {
        if overprice_pct > fair_band_pct {
            Verdict::Overpriced
        } else if overprice_pct < -fair_band_pct {
            Verdict::Bargain
        } else {
            Verdict::Fair
        }
    }
}

/// Identity of one analysis run. Kept apart from [`report`] so that the
/// assembly itself stays deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl RunMetadata {
    /// Fresh v4 id stamped with the current time.
    pub fn new() -> Self {
        RunMetadata {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
        }
    }
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one analysis run produced. Numbers are kept at full precision.
#[derive(Debug, Clone, Serialize)]
pub struct ValuationResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub target_name: String,
    pub observed_price: f64,
    pub fair_price: f64,
    pub overprice_pct: f64,
    pub verdict: Verdict,
    pub model: FittedModel,
    pub comparable_table: ComparableSet,
    pub target_notices: Vec<ExtractionDefaulted>,
}

pub fn report(
    target: &TargetProduct,
    model: FittedModel,
    evaluation: Evaluation,
    comparable_set: ComparableSet,
    fair_band_pct: f64,
    metadata: RunMetadata,
) -> ValuationResult {
    ValuationResult {
        run_id: metadata.run_id,
        generated_at: metadata.generated_at,
        target_name: target.name.clone(),
        observed_price: target.observed_price,
        fair_price: evaluation.fair_price,
        overprice_pct: evaluation.overprice_pct,
        verdict: Verdict::classify(evaluation.overprice_pct, fair_band_pct),
        model,
        comparable_table: comparable_set,
        target_notices: target.notices.clone(),
    }
}

impl ValuationResult {
    /// Comparable table with the model's fair price for every row.
    ///
    /// Columns: `id`, `price`, one column per attribute, `defaulted` (comma
    /// separated names of assumed attributes, empty when none), `fair_price`,
    /// `overprice_pct`.
    pub fn comparables_frame(&self) -> PolarsResult<DataFrame> {
        let records = self.comparable_table.records();

        let ids: Vec<String> = records.iter().map(|record| record.id().to_string()).collect();
        let prices: Vec<f64> = records.iter().map(|record| record.price()).collect();

        let fair_prices: Vec<Option<f64>> = records
            .iter()
            .map(|record| fair_price(&self.model, record.attributes()).ok())
            .collect();
        let deviations: Vec<Option<f64>> = records
            .iter()
            .zip(&fair_prices)
            .map(|(record, fair)| {
                fair.filter(|fair| *fair > 0.0)
                    .map(|fair| overprice_pct(record.price(), fair))
            })
            .collect();

        let mut columns: Vec<Column> = vec![
            Series::new("id".into(), ids).into(),
            Series::new("price".into(), prices).into(),
        ];

        for (index, name) in self.comparable_table.attribute_names().iter().enumerate() {
            let values: Vec<f64> = records
                .iter()
                .map(|record| record.attributes().get(index).unwrap_or(0.0))
                .collect();
            columns.push(Series::new(name.as_str().into(), values).into());
        }

        let defaulted: Vec<String> = records
            .iter()
            .map(|record| {
                record
                    .notices()
                    .iter()
                    .map(|notice| notice.attribute.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        columns.push(Series::new("defaulted".into(), defaulted).into());

        columns.push(Series::new("fair_price".into(), fair_prices).into());
        columns.push(Series::new("overprice_pct".into(), deviations).into());

        DataFrame::new(columns)
    }
}
