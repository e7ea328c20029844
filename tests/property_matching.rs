// Property-based tests for scoring and grid lookup.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use poi_merge::core::grid::GeoGrid;
use poi_merge::core::scorer::{haversine_distance, MatchScorer, EARTH_RADIUS_M};
use poi_merge::{LocationRecord, MatchConfig};
use proptest::prelude::*;

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

/// 從起點沿方位角走 distance 公尺後的座標
fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), lambda2.to_degrees())
}

fn arb_name() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"(Schloss |Burg |Museum )?[A-Z][a-z]{2,10}( [A-Z][a-z]{2,8})?",
        1 => Just(String::new()),
    ]
}

/// Mansfeld-Südharz 周邊
fn arb_point() -> impl Strategy<Value = (f64, f64)> {
    (47.0..55.0f64, 6.0..15.0f64)
}

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn score_is_symmetric(
        (lat, lon) in arb_point(),
        bearing in 0.0..360.0f64,
        distance in 0.0..700.0f64,
        name_a in arb_name(),
        name_b in arb_name(),
    ) {
        let (lat2, lon2) = destination(lat, lon, bearing, distance);
        let a = LocationRecord::new("a", name_a, "seed").with_coordinates(lat, lon);
        let b = LocationRecord::new("b", name_b, "osm").with_coordinates(lat2, lon2);
        let scorer = MatchScorer::new(&MatchConfig::default());

        let ab = scorer.score(&a, &b);
        let ba = scorer.score(&b, &a);
        prop_assert_eq!(ab.score, ba.score);
        prop_assert_eq!(ab.tier, ba.tier);
    }

    #[test]
    fn score_is_zero_beyond_near_distance(
        (lat, lon) in arb_point(),
        bearing in 0.0..360.0f64,
        distance in 505.0..5_000.0f64,
        name in arb_name(),
    ) {
        let (lat2, lon2) = destination(lat, lon, bearing, distance);
        let a = LocationRecord::new("a", name.clone(), "seed").with_coordinates(lat, lon);
        let b = LocationRecord::new("b", name, "osm").with_coordinates(lat2, lon2);
        let scorer = MatchScorer::new(&MatchConfig::default());

        prop_assert!(haversine_distance(lat, lon, lat2, lon2) > 500.0);
        prop_assert_eq!(scorer.score(&a, &b).score, 0.0);
    }

    #[test]
    fn score_stays_in_unit_range(
        (lat, lon) in arb_point(),
        bearing in 0.0..360.0f64,
        distance in 0.0..700.0f64,
        name_a in arb_name(),
        name_b in arb_name(),
    ) {
        let (lat2, lon2) = destination(lat, lon, bearing, distance);
        let a = LocationRecord::new("a", name_a, "seed").with_coordinates(lat, lon);
        let b = LocationRecord::new("b", name_b, "osm").with_coordinates(lat2, lon2);
        let result = MatchScorer::new(&MatchConfig::default()).score(&a, &b);

        prop_assert!((0.0..=1.0).contains(&result.score));
    }

    #[test]
    fn grid_neighbourhood_covers_near_distance(
        (lat, lon) in arb_point(),
        bearing in 0.0..360.0f64,
        distance in 0.0..500.0f64,
    ) {
        let (lat2, lon2) = destination(lat, lon, bearing, distance);
        let records = vec![
            LocationRecord::new("a", "A", "seed").with_coordinates(lat, lon),
            LocationRecord::new("b", "B", "osm").with_coordinates(lat2, lon2),
        ];
        let config = MatchConfig::default();
        let grid = GeoGrid::build(&records, config.cell_size_deg);

        let key = grid.cell_key(lat, lon);
        prop_assert!(grid.candidates(key).contains(&1));
    }
}
