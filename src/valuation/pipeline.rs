use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::ValuationError;
use crate::models::{RawComparable, RawTarget, TargetProduct, validate_price};
use crate::processor::{AttributeExtractor, ComparableBuilder};
use crate::valuation::{HedonicRegression, RunMetadata, ValuationResult, evaluate, report};

/// Runs the whole valuation for one target against one market snapshot.
///
/// Holds only immutable configuration, so a single analyzer can serve any
/// number of independent runs, including from several threads at once.
pub struct HedonicAnalyzer {
    extractor: AttributeExtractor,
    regression: HedonicRegression,
    fair_band_pct: f64,
}

impl HedonicAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, ValuationError> {
        Ok(HedonicAnalyzer {
            extractor: AttributeExtractor::from_config(config)?,
            regression: HedonicRegression::from_config(config),
            fair_band_pct: config.analysis.fair_band_pct,
        })
    }

    pub fn extractor(&self) -> &AttributeExtractor {
        &self.extractor
    }

    /// Validates and extracts the target. Fails before any fitting work.
    pub fn prepare_target(&self, raw: &RawTarget) -> Result<TargetProduct, ValuationError> {
        let observed_price = validate_price(&format!("target '{}'", raw.name), raw.price)?;

        let text = if raw.raw_text.trim().is_empty() {
            &raw.name
        } else {
            &raw.raw_text
        };
        let extracted = self.extractor.extract(text);

        for notice in &extracted.notices {
            warn!(
                "Target '{}': no {} found, assuming {}",
                raw.name, notice.attribute, notice.default
            );
        }

        Ok(TargetProduct::new(raw.name.clone(), observed_price, extracted.values)?
            .with_notices(extracted.notices))
    }

    pub fn analyze(
        &self,
        target: &RawTarget,
        comparables: &[RawComparable],
    ) -> Result<ValuationResult, ValuationError> {
        let target = self.prepare_target(target)?;
        info!(
            "Analyzing '{}' at {} against {} raw comparables",
            target.name,
            target.observed_price,
            comparables.len()
        );

        let set = ComparableBuilder::new(&self.extractor).build(comparables)?;
        let model = self.regression.fit(&set)?;
        info!(
            "Fitted hedonic model: intercept={:.4}, r2={:.4}, shadow prices={:?}",
            model.intercept(),
            model.r_squared(),
            model.shadow_prices()
        );

        let evaluation = evaluate(&target, &model)?;
        info!(
            "Fair value {:.2}, deviation {:.1}%",
            evaluation.fair_price, evaluation.overprice_pct
        );

        Ok(report(
            &target,
            model,
            evaluation,
            set,
            self.fair_band_pct,
            RunMetadata::new(),
        ))
    }
}
