use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};
use wreq::Client;
use wreq_util::Emulation;

use crate::config::SourceConfig;
use crate::models::{RawComparable, RawTarget};
use crate::processor::price_from_json;

/// Product fields pulled out of one extraction response.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedProduct {
    pub url: String,
    pub name: String,
    pub price: Option<f64>,
    pub raw_text: String,
}

/// Client for an automatic product-extraction API.
#[derive(Clone)]
pub struct ExtractionFetcher {
    client: Client,
    config: Arc<SourceConfig>,
}

impl ExtractionFetcher {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .emulation(Emulation::Firefox136)
            .timeout(config.timeout())
            .build()?;

        Ok(ExtractionFetcher {
            client,
            config: Arc::new(config),
        })
    }

    /// Target and comparables listed in the `[market]` section.
    pub async fn fetch_market(&self) -> Result<(RawTarget, Vec<RawComparable>)> {
        let target = self.fetch_target(&self.config.market.target_url).await?;
        let comparables = self.fetch_comparables(&self.config.market.comparable_urls).await;

        Ok((target, comparables))
    }

    pub async fn fetch_target(&self, url: &str) -> Result<RawTarget> {
        info!("Fetching target product: {}", url);
        let product = self.fetch_product(url).await?;

        Ok(RawTarget {
            name: product.name,
            price: product.price,
            raw_text: product.raw_text,
        })
    }

    /// Fetches every URL with at most `concurrency()` requests in flight.
    /// Failed URLs are logged and left out; the rest keep their input order.
    pub async fn fetch_comparables(&self, urls: &[String]) -> Vec<RawComparable> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
        let mut tasks = JoinSet::new();

        for (index, url) in urls.iter().cloned().enumerate() {
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = fetcher.fetch_product(&url).await;
                (index, url, result)
            });
        }

        let mut fetched = Vec::with_capacity(urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(product))) => fetched.push((index, product)),
                Ok((_, url, Err(e))) => warn!("Skipping comparable {}: {}", url, e),
                Err(e) => error!("Comparable fetch task failed: {}", e),
            }
        }
        fetched.sort_by_key(|(index, _)| *index);

        info!("Fetched {} of {} comparables", fetched.len(), urls.len());

        fetched
            .into_iter()
            .map(|(_, product)| RawComparable {
                id: Some(product.url),
                price: product.price,
                raw_text: product.raw_text,
            })
            .collect()
    }

    pub async fn fetch_product(&self, url: &str) -> Result<ExtractedProduct> {
        let max_retries = self.config.request.max_retries;
        let mut attempt = 0;

        loop {
            match self.request_extraction(url).await {
                Ok(data) => return parse_product(url, &data),
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        "Extraction request for {} failed ({}), retry {}/{}",
                        url, e, attempt, max_retries
                    );
                    sleep(self.config.retry_delay()).await;
                }
                Err(e) => {
                    return Err(anyhow!(
                        "Extraction failed for {} after {} attempts: {}",
                        url,
                        attempt + 1,
                        e
                    ));
                }
            }
        }
    }

    async fn request_extraction(&self, url: &str) -> Result<Value> {
        let api_key = self.config.get_api_key()?;

        let response = self
            .client
            .post(&self.config.api.endpoint)
            .basic_auth(api_key, Some(""))
            .json(&json!({ "url": url, "product": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

/// Reads `product.name`, `product.price` and `product.description` from an
/// extraction response.
pub fn parse_product(url: &str, data: &Value) -> Result<ExtractedProduct> {
    let product = data
        .get("product")
        .filter(|product| product.is_object())
        .ok_or_else(|| anyhow!("No product in extraction response for {}", url))?;

    let name = product
        .get("name")
        .and_then(|name| name.as_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Target")
        .to_string();

    let price = product.get("price").and_then(price_from_json);

    let description = product
        .get("description")
        .and_then(|description| description.as_str())
        .map(str::trim)
        .unwrap_or("");

    // Title first so its quantities win the first-match extraction
    let raw_text = if description.is_empty() {
        name.clone()
    } else {
        format!("{}\n{}", name, description)
    };

    Ok(ExtractedProduct {
        url: url.to_string(),
        name,
        price,
        raw_text,
    })
}
