use overprice::config::{AnalysisConfig, CollinearityPolicy, PriceBasis};
use overprice::fetcher::MarketSnapshot;
use overprice::models::{ComparableRecord, ComparableSet, RawComparable, RawTarget, TargetProduct};
use overprice::valuation::{HedonicRegression, RunMetadata, evaluate, report};
use overprice::{HedonicAnalyzer, ValuationError, Verdict};

fn reference_set() -> ComparableSet {
    let rows = [
        (10.00, [100.0, 60.0]),
        (15.00, [200.0, 60.0]),
        (20.00, [200.0, 120.0]),
        (12.50, [150.0, 90.0]),
    ];
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, (price, attrs))| {
            ComparableRecord::new(format!("ref-{}", i + 1), *price, attrs.to_vec().into()).unwrap()
        })
        .collect();

    ComparableSet::new(vec!["mg".to_string(), "count".to_string()], records).unwrap()
}

#[test]
fn reference_market_values_target_at_double() {
    for basis in [PriceBasis::PerUnit, PriceBasis::Total] {
        let set = reference_set();
        let model = HedonicRegression::new(basis, CollinearityPolicy::DropConstant, Some(1))
            .fit(&set)
            .unwrap();
        let target = TargetProduct::new("Target", 30.0, vec![200.0, 60.0].into()).unwrap();

        let evaluation = evaluate(&target, &model).unwrap();
        let result = report(&target, model, evaluation, set, 10.0, RunMetadata::new());

        assert!((result.fair_price - 15.0).abs() < 1e-6);
        assert!((result.overprice_pct - 100.0).abs() < 1e-6);
        assert!(result.model.r_squared() > 0.9);
        assert_eq!(result.verdict, Verdict::Overpriced);
    }
}

#[test]
fn synthetic_linear_market_is_recovered() {
    let (intercept, beta_mg, beta_count) = (8.0, 0.04, 0.025);
    let grid = [
        [100.0, 60.0],
        [200.0, 90.0],
        [400.0, 60.0],
        [100.0, 240.0],
        [200.0, 120.0],
        [400.0, 240.0],
        [150.0, 30.0],
    ];

    for size in 4..=grid.len() {
        let records = grid[..size]
            .iter()
            .enumerate()
            .map(|(i, attrs)| {
                let price = intercept + beta_mg * attrs[0] + beta_count * attrs[1];
                ComparableRecord::new(format!("s{}", i), price, attrs.to_vec().into()).unwrap()
            })
            .collect();
        let set = ComparableSet::new(vec!["mg".to_string(), "count".to_string()], records).unwrap();

        let model = HedonicRegression::new(PriceBasis::Total, CollinearityPolicy::Fail, Some(1))
            .fit(&set)
            .unwrap();

        assert!((model.intercept() - intercept).abs() < 1e-6, "size {}", size);
        assert!((model.coefficient("mg").unwrap() - beta_mg).abs() < 1e-6, "size {}", size);
        assert!((model.coefficient("count").unwrap() - beta_count).abs() < 1e-6, "size {}", size);
    }
}

#[test]
fn minimum_set_size_boundary() {
    let analyzer = HedonicAnalyzer::new(&AnalysisConfig::default()).unwrap();
    let target = RawTarget {
        name: "Zinc Picolinate, 50 mg, 60 Capsules".to_string(),
        price: Some(12.0),
        raw_text: String::new(),
    };
    let market: Vec<RawComparable> = [
        (8.0, "Zinc, 25 mg, 60 capsules"),
        (11.0, "Zinc, 50 mg, 90 capsules"),
        (16.0, "Zinc, 50 mg, 240 capsules"),
        (13.0, "Zinc, 100 mg, 120 capsules"),
    ]
    .iter()
    .map(|(price, text)| RawComparable {
        id: None,
        price: Some(*price),
        raw_text: text.to_string(),
    })
    .collect();

    let err = analyzer.analyze(&target, &market[..3]).unwrap_err();
    assert_eq!(
        err,
        ValuationError::InsufficientData {
            found: 3,
            required: 4,
            dimensionality: 2
        }
    );

    assert!(analyzer.analyze(&target, &market).is_ok());
}

#[test]
fn sample_market_file_runs_end_to_end() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample_market.json");
    let snapshot = MarketSnapshot::from_file(path).unwrap();
    let analyzer = HedonicAnalyzer::new(&AnalysisConfig::default()).unwrap();

    let first = analyzer.analyze(&snapshot.target, &snapshot.comparables).unwrap();
    let second = analyzer.analyze(&snapshot.target, &snapshot.comparables).unwrap();

    // Sold-out and powder listings are filtered out
    assert_eq!(first.comparable_table.len(), snapshot.comparables.len() - 2);
    assert!(first.fair_price > 0.0);
    assert_eq!(first.fair_price, second.fair_price);
    assert_eq!(first.overprice_pct, second.overprice_pct);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.verdict, Verdict::Overpriced);
}

#[test]
fn analyzer_can_be_shared_across_threads() {
    let analyzer = std::sync::Arc::new(HedonicAnalyzer::new(&AnalysisConfig::default()).unwrap());
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample_market.json");
    let snapshot = std::sync::Arc::new(MarketSnapshot::from_file(path).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let analyzer = analyzer.clone();
            let snapshot = snapshot.clone();
            std::thread::spawn(move || {
                analyzer
                    .analyze(&snapshot.target, &snapshot.comparables)
                    .map(|result| result.fair_price)
            })
        })
        .collect();

    let prices: Vec<f64> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    assert!(prices.windows(2).all(|pair| pair[0] == pair[1]));
}
