use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{RawComparable, RawTarget};

/// A saved market: the target and its comparables, as a data source would
/// have delivered them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub target: RawTarget,
    #[serde(default)]
    pub comparables: Vec<RawComparable>,
}

impl MarketSnapshot {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read market file: {}", path))?;

        let snapshot = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse market file: {}", path))?;

        info!(
            "Loaded market for '{}' with {} comparables from {}",
            snapshot.target.name,
            snapshot.comparables.len(),
            path
        );

        Ok(snapshot)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = MarketSnapshot::from_json_str(
            r#"{
                "target": { "name": "Magnesium 200 mg 60 caps", "price": "A$30.00" },
                "comparables": [
                    { "id": "m-1", "price": 10.0, "raw_text": "Magnesium 100 mg 60 caps" },
                    { "price": null, "raw_text": "Magnesium 400 mg 240 caps" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.target.price, Some(30.0));
        assert_eq!(snapshot.comparables.len(), 2);
        assert_eq!(snapshot.comparables[0].id.as_deref(), Some("m-1"));
        assert_eq!(snapshot.comparables[1].price, None);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = MarketSnapshot::from_file("does/not/exist.json").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn test_bundled_sample_market_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample_market.json");
        let snapshot = MarketSnapshot::from_file(path).unwrap();

        assert!(!snapshot.comparables.is_empty());
        assert!(snapshot.target.price.is_some());
    }
}
