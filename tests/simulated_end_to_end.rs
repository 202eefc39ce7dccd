use ipw_exposure::app::pipeline::{estimate_all, run_estimates, weigh_table};
use ipw_exposure::data::{EXPOSURE_COLUMN, OUTCOME_COLUMN, sim_schema, simulate_units};
use ipw_exposure::domain::{EstimateMethod, SimConfig, WeightConfig, WeightMethod};
use ipw_exposure::estimate::fit_weighted_logistic;
use ipw_exposure::io::{read_estimates_json, write_estimates_json, write_units_csv};
use ipw_exposure::math::mean;

const METHODS: [WeightMethod; 2] = [WeightMethod::Normal, WeightMethod::QuantileBin];

fn sim(n: usize, seed: u64) -> ipw_exposure::domain::UnitTable {
    simulate_units(&SimConfig {
        n,
        seed,
        effect_per_10: 0.3,
    })
    .unwrap()
}

#[test]
fn both_methods_average_near_one_without_violations() {
    let table = sim(2000, 17);
    let sets = weigh_table(&table, &METHODS, 5).unwrap();
    assert_eq!(sets.len(), 2);

    for set in &sets {
        assert_eq!(set.weights.len(), table.len());
        assert!(!set.has_violations(), "{:?} has violations", set.method);
        let m = mean(&set.values());
        assert!((m - 1.0).abs() < 0.1, "{:?} mean weight {m}", set.method);
    }

    let bins = sets[1].bins.as_ref().unwrap();
    for b in 1..=5 {
        let count = bins.iter().filter(|&&x| x == b).count();
        assert_eq!(count, 400, "bin {b}");
    }
}

#[test]
fn weighting_is_repeatable() {
    let table = sim(300, 3);
    let a = weigh_table(&table, &METHODS, 4).unwrap();
    let b = weigh_table(&table, &METHODS, 4).unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.values(), y.values());
        assert_eq!(x.bins, y.bins);
    }
}

#[test]
fn weighting_moves_the_estimate_away_from_the_confounded_one() {
    let table = sim(3000, 23);
    let sets = weigh_table(&table, &METHODS, 10).unwrap();
    let (estimates, skipped) = estimate_all(&table, &sets).unwrap();
    assert!(skipped.is_empty());
    assert_eq!(estimates.len(), 2);
    assert_eq!(estimates[0].method, EstimateMethod::IpwNormal);
    assert_eq!(estimates[1].method, EstimateMethod::IpwQuantileBin);

    let ones = vec![1.0; table.len()];
    let crude = fit_weighted_logistic(&table.exposures(), &table.outcomes(), &ones).unwrap();

    for est in &estimates {
        assert!(est.ci_lower < est.estimate && est.estimate < est.ci_upper);
        assert!(est.estimate > 0.0 && est.estimate < 0.07, "{est:?}");
        // W raises both A and Y, so the unweighted slope is biased upward.
        assert!(est.estimate < crude.slope, "{est:?} vs crude {}", crude.slope);
    }
}

#[test]
fn csv_pipeline_matches_in_memory_weights() {
    let table = sim(500, 9);
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("sim.csv");
    write_units_csv(&csv_path, &table, EXPOSURE_COLUMN, OUTCOME_COLUMN).unwrap();

    let config = WeightConfig {
        csv_path,
        id_column: Some("id".into()),
        exposure_column: EXPOSURE_COLUMN.into(),
        outcome_column: OUTCOME_COLUMN.into(),
        covariates: sim_schema(),
        methods: vec![WeightMethod::Normal],
        num_bins: 10,
        export_weights: None,
        export_estimates: Some(dir.path().join("est.json")),
    };
    let run = run_estimates(&config).unwrap();
    assert_eq!(run.weights.ingest.rows_used, 500);
    assert!(run.weights.ingest.row_errors.is_empty());

    let direct = weigh_table(&table, &[WeightMethod::Normal], 10).unwrap();
    for (from_csv, in_memory) in run.weights.sets[0].values().iter().zip(direct[0].values()) {
        assert!((from_csv - in_memory).abs() < 1e-4 * in_memory.max(1.0));
    }

    let path = config.export_estimates.clone().unwrap();
    write_estimates_json(&path, &ipw_exposure::app::pipeline::estimates_file(&config, &run)).unwrap();
    let back = read_estimates_json(&path).unwrap();
    assert_eq!(back.n_units, 500);
    assert_eq!(back.covariates, vec!["age_z", "sex", "severity_z"]);
    assert_eq!(back.estimates.len(), 1);
    assert_eq!(back.diagnostics[0].positivity_violations, 0);
}
