use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ValuationError;

/// Response variable used by the regression for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// Regress price divided by unit count; fair price is scaled back up by
    /// the target's unit count.
    #[default]
    PerUnit,
    /// Regress the shelf price as-is.
    Total,
}

/// What to do with attributes that carry no variance across the comparables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollinearityPolicy {
    Fail,
    #[default]
    DropConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    #[default]
    Quantity,
    UnitCount,
}

/// A unit label and the multiplier that brings it to the attribute's base unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitToken {
    pub token: String,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

impl UnitToken {
    pub fn new(token: &str, factor: f64) -> Self {
        UnitToken {
            token: token.to_string(),
            factor,
        }
    }
}

fn default_factor() -> f64 {
    1.0
}

/// One dimension of the attribute vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(default)]
    pub kind: AttributeKind,
    pub default: f64,
    #[serde(default)]
    pub units: Vec<UnitToken>,
    /// Only match quantities that follow this word.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Verbatim regex; the first capture group is the number.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSection {
    #[serde(default)]
    pub price_basis: PriceBasis,
    #[serde(default)]
    pub collinearity: CollinearityPolicy,
    /// Deviation (in percent) still considered a fair price.
    #[serde(default = "default_fair_band")]
    pub fair_band_pct: f64,
}

fn default_fair_band() -> f64 {
    10.0
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            price_basis: PriceBasis::default(),
            collinearity: CollinearityPolicy::default(),
            fair_band_pct: default_fair_band(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub analysis: AnalysisSection,
    pub attributes: Vec<AttributeSpec>,
}

impl AnalysisConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis config file: {}", path))?;

        let config: AnalysisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse analysis config file: {}", path))?;

        config
            .validate()
            .with_context(|| format!("Invalid analysis config: {}", path))?;

        Ok(config)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|spec| spec.name.clone()).collect()
    }

    /// Position of the unit-count dimension, if the schema has one.
    pub fn unit_count_index(&self) -> Option<usize> {
        self.attributes
            .iter()
            .position(|spec| spec.kind == AttributeKind::UnitCount)
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.attributes.is_empty() {
            return Err(invalid("<schema>", "at least one attribute is required"));
        }

        let mut seen = HashSet::new();
        for spec in &self.attributes {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(invalid("<unnamed>", "attribute name is empty"));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(invalid(name, "duplicate attribute name"));
            }
            if !spec.default.is_finite() || spec.default < 0.0 {
                return Err(invalid(name, "default must be a non-negative number"));
            }
            if spec.kind == AttributeKind::UnitCount && spec.default < 1.0 {
                return Err(invalid(name, "unit count default must be at least 1"));
            }
            if spec.pattern.is_none() && spec.units.is_empty() {
                return Err(invalid(name, "either units or pattern must be given"));
            }
            if let Some(unit) = spec
                .units
                .iter()
                .find(|unit| unit.token.trim().is_empty() || !unit.factor.is_finite() || unit.factor <= 0.0)
            {
                return Err(invalid(
                    name,
                    &format!("unit token '{}' needs a label and a positive factor", unit.token),
                ));
            }
        }

        let unit_counts = self
            .attributes
            .iter()
            .filter(|spec| spec.kind == AttributeKind::UnitCount)
            .count();
        if unit_counts > 1 {
            return Err(invalid("<schema>", "only one unit_count attribute is allowed"));
        }
        if self.analysis.price_basis == PriceBasis::PerUnit && unit_counts == 0 {
            return Err(invalid(
                "<schema>",
                "per_unit price basis needs a unit_count attribute",
            ));
        }

        if !self.analysis.fair_band_pct.is_finite() || self.analysis.fair_band_pct < 0.0 {
            return Err(invalid("<analysis>", "fair_band_pct must be a non-negative number"));
        }

        Ok(())
    }
}

impl Default for AnalysisConfig {
    /// Milligrams of active ingredient and pill count, defaulting to 100 mg
    /// and 60 units when the listing does not say.
    fn default() -> Self {
        Self {
            analysis: AnalysisSection::default(),
            attributes: vec![
                AttributeSpec {
                    name: "mg".to_string(),
                    kind: AttributeKind::Quantity,
                    default: 100.0,
                    units: vec![
                        UnitToken::new("mg", 1.0),
                        UnitToken::new("mcg", 0.001),
                        UnitToken::new("g", 1000.0),
                    ],
                    keyword: None,
                    pattern: None,
                },
                AttributeSpec {
                    name: "count".to_string(),
                    kind: AttributeKind::UnitCount,
                    default: 60.0,
                    units: ["count", "ct", "caps", "capsules", "vcaps", "tabs", "tablets", "softgels", "gummies"]
                        .iter()
                        .map(|token| UnitToken::new(token, 1.0))
                        .collect(),
                    keyword: None,
                    pattern: None,
                },
            ],
        }
    }
}

fn invalid(attribute: &str, reason: &str) -> ValuationError {
    ValuationError::InvalidSchema {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.attribute_names(), vec!["mg", "count"]);
        assert_eq!(config.unit_count_index(), Some(1));
        assert_eq!(config.analysis.price_basis, PriceBasis::PerUnit);
        assert_eq!(config.analysis.collinearity, CollinearityPolicy::DropConstant);
        assert_eq!(config.analysis.fair_band_pct, 10.0);
    }

    #[test]
    fn test_bundled_config_matches_default() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/src/configs/analysis.toml");
        let config = AnalysisConfig::from_file(path).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_parse_toml_schema() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [analysis]
            price_basis = "total"
            collinearity = "fail"

            [[attributes]]
            name = "vitamin_c"
            keyword = "vitamin c"
            default = 0.0
            units = [{ token = "mg" }, { token = "g", factor = 1000.0 }]

            [[attributes]]
            name = "count"
            kind = "unit_count"
            default = 60.0
            pattern = '(\d+)\s*(?:caps|tabs)'
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.price_basis, PriceBasis::Total);
        assert_eq!(config.analysis.collinearity, CollinearityPolicy::Fail);
        assert_eq!(config.analysis.fair_band_pct, 10.0);
        assert_eq!(config.attributes[0].units[0].factor, 1.0);
        assert_eq!(config.attributes[0].keyword.as_deref(), Some("vitamin c"));
        assert_eq!(config.attributes[1].kind, AttributeKind::UnitCount);
    }

    #[test]
    fn test_per_unit_requires_unit_count() {
        let mut config = AnalysisConfig::default();
        config.attributes.truncate(1);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValuationError::InvalidSchema { .. }));

        config.analysis.price_basis = PriceBasis::Total;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_defaults() {
        let mut config = AnalysisConfig::default();
        config.attributes[1].name = "MG".to_string();
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.attributes[1].default = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.attributes[0].units[0].factor = 0.0;
        assert!(config.validate().is_err());
    }
}
