use anyhow::{Context, Result};
use overprice::config::AnalysisConfig;
use overprice::HedonicAnalyzer;
use std::env;
use std::path::Path;
use tracing_subscriber;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("=== DEBUGGING ATTRIBUTE EXTRACTION ===\n");

    let config_path = "src/configs/analysis.toml";
    let config = if Path::new(config_path).exists() {
        AnalysisConfig::from_file(config_path)?
    } else {
        println!("⚠️ {} not found, using built-in schema", config_path);
        AnalysisConfig::default()
    };

    let analyzer = HedonicAnalyzer::new(&config).context("Invalid analysis configuration")?;
    let extractor = analyzer.extractor();
    let names = extractor.attribute_names();
    println!("Schema: {:?}\n", names);

    let mut texts: Vec<String> = env::args().skip(1).collect();
    if texts.is_empty() {
        texts = vec![
            "Magnesium Glycinate, 200 mg, 120 Capsules".to_string(),
            "Vitamin C 1 g, 250 Tablets".to_string(),
            "Generic Pills".to_string(),
        ];
    }

    for text in &texts {
        let extracted = extractor.extract(text);
        println!("📝 {}", text);
        for ((name, value), source) in names
            .iter()
            .zip(extracted.values.as_slice())
            .zip(&extracted.sources)
        {
            println!("   {:<12} {:>10} ({:?})", name, value, source);
        }
        if !extracted.any_extracted() {
            println!("   ❌ nothing extracted, this listing would be skipped as a comparable");
        }
        println!();
    }

    Ok(())
}
