use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValuationError;
use crate::processor::price_parser::price_from_json;

/// Ordered attribute values for one product, one slot per schema dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeVector(Vec<f64>);

impl AttributeVector {
    pub fn new(values: Vec<f64>) -> Self {
        AttributeVector(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Every slot must be a finite, non-negative number.
    pub fn validate(&self, subject: &str) -> Result<(), ValuationError> {
        if let Some((index, value)) = self
            .0
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite() || **value < 0.0)
        {
            return Err(ValuationError::InvalidInput {
                subject: subject.to_string(),
                reason: format!("attribute slot {} has invalid value {}", index, value),
            });
        }
        Ok(())
    }
}

impl From<Vec<f64>> for AttributeVector {
    fn from(values: Vec<f64>) -> Self {
        AttributeVector(values)
    }
}

/// Where an attribute value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSource {
    Extracted,
    Defaulted,
}

/// Soft signal: the extractor fell back to a default for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDefaulted {
    pub attribute: String,
    pub default: f64,
}

/// Output of the attribute extractor for one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAttributes {
    pub values: AttributeVector,
    pub sources: Vec<AttributeSource>,
    pub notices: Vec<ExtractionDefaulted>,
}

impl ExtractedAttributes {
    pub fn any_extracted(&self) -> bool {
        self.sources.contains(&AttributeSource::Extracted)
    }
}

/// Target product as delivered by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTarget {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price: Option<f64>,
    #[serde(default)]
    pub raw_text: String,
}

/// One comparable product as delivered by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComparable {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price: Option<f64>,
    #[serde(default)]
    pub raw_text: String,
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(price_from_json(&value))
}

/// The product being valued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetProduct {
    pub name: String,
    pub observed_price: f64,
    pub attributes: AttributeVector,
    pub notices: Vec<ExtractionDefaulted>,
}

impl TargetProduct {
    pub fn new(
        name: impl Into<String>,
        observed_price: f64,
        attributes: AttributeVector,
    ) -> Result<Self, ValuationError> {
        let name = name.into();
        validate_price(&format!("target '{}'", name), Some(observed_price))?;
        attributes.validate(&format!("target '{}'", name))?;

        Ok(TargetProduct {
            name,
            observed_price,
            attributes,
            notices: Vec::new(),
        })
    }

    pub fn with_notices(mut self, notices: Vec<ExtractionDefaulted>) -> Self {
        self.notices = notices;
        self
    }
}

/// One market observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableRecord {
    id: String,
    price: f64,
    attributes: AttributeVector,
    notices: Vec<ExtractionDefaulted>,
}

impl ComparableRecord {
    pub fn new(
        id: impl Into<String>,
        price: f64,
        attributes: AttributeVector,
    ) -> Result<Self, ValuationError> {
        let id = id.into();
        let subject = format!("comparable '{}'", id);
        validate_price(&subject, Some(price))?;
        attributes.validate(&subject)?;

        Ok(ComparableRecord {
            id,
            price,
            attributes,
            notices: Vec::new(),
        })
    }

    pub fn with_notices(mut self, notices: Vec<ExtractionDefaulted>) -> Self {
        self.notices = notices;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn attributes(&self) -> &AttributeVector {
        &self.attributes
    }

    /// Attributes that were assumed rather than read from the listing.
    pub fn notices(&self) -> &[ExtractionDefaulted] {
        &self.notices
    }

    pub fn is_defaulted(&self) -> bool {
        !self.notices.is_empty()
    }
}

/// Comparable records of one run, with the attribute names they share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableSet {
    attribute_names: Vec<String>,
    records: Vec<ComparableRecord>,
}

impl ComparableSet {
    /// Smallest set the regression will accept for `dimensionality` attributes.
    pub fn minimum_size(dimensionality: usize) -> usize {
        (dimensionality + 2).max(3)
    }

    pub fn new(
        attribute_names: Vec<String>,
        records: Vec<ComparableRecord>,
    ) -> Result<Self, ValuationError> {
        let dimensionality = attribute_names.len();

        if let Some(record) = records
            .iter()
            .find(|record| record.attributes.len() != dimensionality)
        {
            return Err(ValuationError::DimensionMismatch {
                expected: dimensionality,
                found: record.attributes.len(),
            });
        }

        let required = Self::minimum_size(dimensionality);
        if records.len() < required {
            return Err(ValuationError::InsufficientData {
                found: records.len(),
                required,
                dimensionality,
            });
        }

        Ok(ComparableSet {
            attribute_names,
            records,
        })
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn records(&self) -> &[ComparableRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimensionality(&self) -> usize {
        self.attribute_names.len()
    }
}

pub(crate) fn validate_price(subject: &str, price: Option<f64>) -> Result<f64, ValuationError> {
    match price {
        None => Err(ValuationError::InvalidInput {
            subject: subject.to_string(),
            reason: "price is missing".to_string(),
        }),
        Some(value) if !value.is_finite() || value <= 0.0 => Err(ValuationError::InvalidInput {
            subject: subject.to_string(),
            reason: format!("price must be positive, got {}", value),
        }),
        Some(value) => Ok(value),
    }
}
