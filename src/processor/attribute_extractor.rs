use regex::{Captures, Regex, RegexBuilder};
use std::str::FromStr;
use tracing::debug;

use crate::config::{AnalysisConfig, AttributeKind, AttributeSpec};
use crate::error::ValuationError;
use crate::models::{AttributeSource, AttributeVector, ExtractedAttributes, ExtractionDefaulted};

const NUMBER: &str = r"(\d[\d,]*(?:\.\d+)?)";

// Keyword and quantity may be separated by this many non-digit characters
const KEYWORD_REACH: usize = 24;

struct CompiledAttribute {
    name: String,
    kind: AttributeKind,
    default: f64,
    pattern: Regex,
    factors: Vec<(String, f64)>,
}

/// Turns product titles and descriptions into attribute vectors.
///
/// Matching is case-insensitive and only the first quantity found for each
/// attribute is used. Pages that mention several strengths will report
/// whichever comes first.
pub struct AttributeExtractor {
    attributes: Vec<CompiledAttribute>,
}

impl AttributeExtractor {
    pub fn new(schema: &[AttributeSpec]) -> Result<Self, ValuationError> {
        let attributes = schema
            .iter()
            .map(compile_attribute)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AttributeExtractor { attributes })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ValuationError> {
        config.validate()?;
        Self::new(&config.attributes)
    }

    pub fn dimensionality(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|attr| attr.name.clone()).collect()
    }

    pub fn extract(&self, text: &str) -> ExtractedAttributes {
        let mut values = Vec::with_capacity(self.attributes.len());
        let mut sources = Vec::with_capacity(self.attributes.len());
        let mut notices = Vec::new();

        for attribute in &self.attributes {
            match attribute.first_value(text) {
                Some(value) => {
                    values.push(value);
                    sources.push(AttributeSource::Extracted);
                }
                None => {
                    debug!(
                        "No '{}' found, using default {}",
                        attribute.name, attribute.default
                    );
                    values.push(attribute.default);
                    sources.push(AttributeSource::Defaulted);
                    notices.push(ExtractionDefaulted {
                        attribute: attribute.name.clone(),
                        default: attribute.default,
                    });
                }
            }
        }

        ExtractedAttributes {
            values: AttributeVector::new(values),
            sources,
            notices,
        }
    }
}

/// One-shot extraction against a schema.
pub fn extract(text: &str, schema: &[AttributeSpec]) -> Result<ExtractedAttributes, ValuationError> {
    Ok(AttributeExtractor::new(schema)?.extract(text))
}

impl CompiledAttribute {
    fn first_value(&self, text: &str) -> Option<f64> {
        let captures = self.pattern.captures(text)?;
        let raw = captures.get(1)?.as_str().replace(',', "");
        let number = f64::from_str(&raw).ok()?;
        let value = number * self.factor_for(&captures);

        if !value.is_finite() || value < 0.0 {
            return None;
        }

        match self.kind {
            AttributeKind::Quantity => Some(value),
            AttributeKind::UnitCount => {
                let units = value.trunc();
                if units >= 1.0 { Some(units) } else { None }
            }
        }
    }

    fn factor_for(&self, captures: &Captures) -> f64 {
        captures
            .get(2)
            .and_then(|unit| {
                let unit = unit.as_str().to_lowercase();
                self.factors
                    .iter()
                    .find(|(token, _)| *token == unit)
                    .map(|(_, factor)| *factor)
            })
            .unwrap_or(1.0)
    }
}

fn compile_attribute(spec: &AttributeSpec) -> Result<CompiledAttribute, ValuationError> {
    let source = match &spec.pattern {
        Some(pattern) => pattern.clone(),
        None => build_pattern(spec),
    };

    let pattern = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| ValuationError::InvalidSchema {
            attribute: spec.name.clone(),
            reason: e.to_string(),
        })?;

    if pattern.captures_len() < 2 {
        return Err(ValuationError::InvalidSchema {
            attribute: spec.name.clone(),
            reason: "pattern needs a capture group for the number".to_string(),
        });
    }

    Ok(CompiledAttribute {
        name: spec.name.clone(),
        kind: spec.kind,
        default: spec.default,
        pattern,
        factors: spec
            .units
            .iter()
            .map(|unit| (unit.token.trim().to_lowercase(), unit.factor))
            .collect(),
    })
}

fn build_pattern(spec: &AttributeSpec) -> String {
    // Longest token first so "capsules" wins over "caps"
    let mut tokens: Vec<&str> = spec.units.iter().map(|unit| unit.token.trim()).collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()));
    let units = tokens
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    let quantity = format!(r"{}\s*-?\s*({})\b", NUMBER, units);

    match &spec.keyword {
        Some(keyword) => format!(
            r"\b{}\b[^\d]{{0,{}}}?{}",
            regex::escape(keyword.trim()),
            KEYWORD_REACH,
            quantity
        ),
        None => quantity,
    }
}
