use tracing::{debug, info, warn};

use crate::error::ValuationError;
use crate::models::{ComparableRecord, ComparableSet, RawComparable};
use crate::processor::AttributeExtractor;

/// Why a raw comparable did not make it into the set.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingPrice,
    NonPositivePrice(f64),
    NoExtractedAttributes,
    Rejected(String),
}

pub struct ComparableBuilder<'a> {
    extractor: &'a AttributeExtractor,
}

impl<'a> ComparableBuilder<'a> {
    pub fn new(extractor: &'a AttributeExtractor) -> Self {
        ComparableBuilder { extractor }
    }

    /// Extracts every raw item and keeps the usable ones, in input order.
    pub fn build(&self, raw_items: &[RawComparable]) -> Result<ComparableSet, ValuationError> {
        let mut records = Vec::with_capacity(raw_items.len());
        let mut skipped = 0;
        let mut defaulted = 0;

        for (index, item) in raw_items.iter().enumerate() {
            let id = item
                .id
                .clone()
                .unwrap_or_else(|| format!("comparable-{}", index + 1));

            match self.build_record(id.clone(), item) {
                Ok(record) => {
                    if record.is_defaulted() {
                        defaulted += 1;
                        debug!("Comparable {} uses defaults: {:?}", id, record.notices());
                    }
                    records.push(record);
                }
                Err(reason) => {
                    skipped += 1;
                    warn!("Skipping comparable {} at index {}: {:?}", id, index, reason);
                }
            }
        }

        info!(
            "Comparable set summary: {} usable ({} with defaulted attributes), {} skipped out of {} total",
            records.len(),
            defaulted,
            skipped,
            raw_items.len()
        );

        ComparableSet::new(self.extractor.attribute_names(), records)
    }

    fn build_record(&self, id: String, item: &RawComparable) -> Result<ComparableRecord, SkipReason> {
        let price = match item.price {
            None => return Err(SkipReason::MissingPrice),
            Some(price) if !price.is_finite() || price <= 0.0 => {
                return Err(SkipReason::NonPositivePrice(price));
            }
            Some(price) => price,
        };

        let extracted = self.extractor.extract(&item.raw_text);
        if !extracted.any_extracted() {
            return Err(SkipReason::NoExtractedAttributes);
        }

        ComparableRecord::new(id, price, extracted.values)
            .map(|record| record.with_notices(extracted.notices))
            .map_err(|e| SkipReason::Rejected(e.to_string()))
    }
}
