use anyhow::{Context, Result};
use dotenv;
use overprice::config::{AnalysisConfig, SourceConfig};
use overprice::fetcher::{ExtractionFetcher, MarketSnapshot};
use overprice::{HedonicAnalyzer, ValuationError, ValuationResult, Verdict};
use polars::prelude::*;
use std::env;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber;

const ANALYSIS_CONFIG: &str = "src/configs/analysis.toml";
const SOURCE_CONFIG: &str = "src/configs/source.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let market_file = flag_value(&args, "--from-file");
    let analysis_path = flag_value(&args, "--config").unwrap_or_else(|| ANALYSIS_CONFIG.to_string());
    let source_path = flag_value(&args, "--source").unwrap_or_else(|| SOURCE_CONFIG.to_string());
    let parquet_path = flag_value(&args, "--parquet");
    let print_json = args.iter().any(|arg| arg == "--json");

    let analysis_config = if Path::new(&analysis_path).exists() {
        AnalysisConfig::from_file(&analysis_path)?
    } else {
        warn!("Analysis config not found at {}, using built-in schema", analysis_path);
        AnalysisConfig::default()
    };

    let analyzer = HedonicAnalyzer::new(&analysis_config).context("Invalid attribute schema")?;

    let (target, comparables) = match &market_file {
        Some(path) => {
            info!("🚀 Starting OverPrice analysis (market file {})", path);
            let snapshot = MarketSnapshot::from_file(path)?;
            (snapshot.target, snapshot.comparables)
        }
        None => {
            info!("🚀 Starting OverPrice analysis (extraction API)");
            let source_config = SourceConfig::from_file(&source_path)
                .context("Failed to load source configuration")?;
            info!(
                "Loaded source config: {} with {} comparable URLs",
                source_config.api.name,
                source_config.market.comparable_urls.len()
            );

            let fetcher = ExtractionFetcher::new(source_config)?;
            fetcher.fetch_market().await?
        }
    };

    let result = match analyzer.analyze(&target, &comparables) {
        Ok(result) => result,
        Err(e) => {
            error!("❌ {}", describe_failure(&e));
            return Err(e.into());
        }
    };

    render(&result);

    if print_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if let Some(path) = parquet_path {
        let mut df = result.comparables_frame()?;
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path))?;
        ParquetWriter::new(&mut file).finish(&mut df)?;
        info!("Stored comparable table at: {}", path);
    }

    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .filter(|value| !value.starts_with("--"))
        .cloned()
}

fn describe_failure(error: &ValuationError) -> String {
    match error {
        ValuationError::InvalidInput { subject, reason } => {
            format!("Cannot value {}: {}", subject, reason)
        }
        ValuationError::InsufficientData { found, required, .. } => format!(
            "Only {} usable comparable products were found; at least {} are needed",
            found, required
        ),
        ValuationError::IllConditionedModel { attribute, .. } => format!(
            "The comparables do not vary enough in '{}' to price it separately",
            attribute
        ),
        ValuationError::DegenerateFairValue { fair_price } => format!(
            "The market model predicts a non-positive fair price ({:.2}) for this product",
            fair_price
        ),
        other => other.to_string(),
    }
}

fn render(result: &ValuationResult) {
    println!("\n=== ⚖️ OverPrice: Hedonic Market Analyzer ===");
    println!("Product:           {}", result.target_name);
    println!("Actual Price:      ${:.2}", result.observed_price);
    println!("Fair Market Value: ${:.2}", result.fair_price);
    println!("OverPrice Factor:  {:+.1}%", result.overprice_pct);

    println!("\nShadow prices (intercept {:.4}):", result.model.intercept());
    for shadow in result.model.shadow_prices() {
        println!("   {:<12} {:>12.6}", shadow.attribute, shadow.value);
    }
    if !result.model.dropped_attributes().is_empty() {
        println!("   (constant across comparables: {:?})", result.model.dropped_attributes());
    }
    println!(
        "R²: {:.3} (adjusted {:.3}) over {} comparables",
        result.model.r_squared(),
        result.model.adjusted_r_squared(),
        result.model.observations()
    );

    let defaulted = result
        .comparable_table
        .records()
        .iter()
        .filter(|record| record.is_defaulted())
        .count();
    if defaulted > 0 {
        println!("   ({} comparables priced with assumed attributes)", defaulted);
    }

    for notice in &result.target_notices {
        println!("⚠️ No {} found in the listing, assumed {}", notice.attribute, notice.default);
    }

    println!();
    match result.verdict {
        Verdict::Overpriced => println!(
            "🚨 {} is significantly overpriced compared to similar products.",
            result.target_name
        ),
        Verdict::Bargain => println!("💎 {} is a market-leading bargain!", result.target_name),
        Verdict::Fair => println!("This product is priced fairly according to current market specs."),
    }
}
