use hexabot::search::eval::EvaluationWeights;
use hexabot::search::pvs::SearchConfig;
use hexabot::selfplay::{optimize, GaConfig, WeightProfile};

#[test]
fn profile_survives_a_disk_round_trip() {
    let profile = WeightProfile::new(
        "test-profile",
        EvaluationWeights::default(),
        SearchConfig::default(),
        "round trip",
    );
    let path = std::env::temp_dir().join("hexabot_profile_test.json");
    profile.save(&path).unwrap();
    let back = WeightProfile::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(back.name, "test-profile");
    assert_eq!(back.weights, profile.weights);
    assert_eq!(back.search_config.max_depth, profile.search_config.max_depth);
}

// Full fitness games run the PVS engine for dozens of plies; keep the real
// optimizer run out of the default test pass.
#[test]
#[ignore]
fn tiny_optimizer_run_produces_a_champion_in_range() {
    let cfg = GaConfig {
        population_size: 2,
        generations: 1,
        match_count: 1,
        mutation_rate: 0.3,
        seed: 123,
    };
    let mut reports = Vec::new();
    let best = optimize(&cfg, |r| reports.push(r.clone()));
    assert_eq!(reports.len(), 1);
    assert!(best.fitness >= reports[0].avg_fitness - 1e-9);
    for v in [
        best.weights.road3,
        best.weights.road4,
        best.weights.live4,
        best.weights.live5,
        best.weights.vcdt_bonus,
    ] {
        assert!((50.0..=20_000.0).contains(&v));
    }
}
