//! 兩筆記錄的重複分數：大圓距離加上模糊名稱相似度。

use crate::config::matching::{DistanceThresholds, FuzzyThresholds, MatchConfig};
use crate::domain::model::{LocationRecord, MatchResult, MatchTier};
use std::collections::HashSet;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 編譯時是否帶有模糊比對（`fuzzy` feature）
pub const FUZZY_SUPPORTED: bool = cfg!(feature = "fuzzy");

/// Haversine 公式，回傳公尺
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(feature = "fuzzy")]
fn fuzzy_ratio(a: &str, b: &str) -> Option<f64> {
    // InDel 比例：2·LCS / (len_a + len_b)
    Some(rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0)
}

#[cfg(not(feature = "fuzzy"))]
fn fuzzy_ratio(_a: &str, _b: &str) -> Option<f64> {
    None
}

/// 名稱正規化：小寫、去符號、去掉通用字（museum、schloss、the ...）
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    generic_words: HashSet<String>,
}

impl NameNormalizer {
    pub fn new<I, S>(generic_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            generic_words: generic_words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn normalize(&self, name: &str) -> String {
        let cleaned: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();

        cleaned
            .split_whitespace()
            .filter(|word| !self.generic_words.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct MatchScorer {
    distance: DistanceThresholds,
    fuzzy: FuzzyThresholds,
    normalizer: NameNormalizer,
    fuzzy_enabled: bool,
}

impl MatchScorer {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            distance: config.distance,
            fuzzy: config.fuzzy,
            normalizer: NameNormalizer::new(&config.generic_name_words),
            fuzzy_enabled: config.fuzzy_matching,
        }
    }

    /// false 時名稱分數恆為 0，只剩距離層級
    pub fn fuzzy_available(&self) -> bool {
        self.fuzzy_enabled && FUZZY_SUPPORTED
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// 兩個正規化後的名稱都不為空時才計算，範圍 0-100
    pub fn name_similarity(&self, a: &str, b: &str) -> Option<f64> {
        if !self.fuzzy_enabled {
            return None;
        }
        let a = self.normalizer.normalize(a);
        let b = self.normalizer.normalize(b);
        if a.is_empty() || b.is_empty() {
            return None;
        }
        fuzzy_ratio(&a, &b)
    }

    pub fn score(&self, a: &LocationRecord, b: &LocationRecord) -> MatchResult {
        let ((lat1, lon1), (lat2, lon2)) = match (a.coordinates(), b.coordinates()) {
            (Some(pa), Some(pb)) => (pa, pb),
            _ => {
                return MatchResult {
                    score: 0.0,
                    tier: MatchTier::MissingCoordinates,
                    distance_m: None,
                    name_score: None,
                }
            }
        };

        let distance = haversine_distance(lat1, lon1, lat2, lon2);
        if distance > self.distance.near_m {
            return MatchResult {
                score: 0.0,
                tier: MatchTier::TooFar,
                distance_m: Some(distance),
                name_score: None,
            };
        }

        let name_score = self.name_similarity(&a.name, &b.name);
        let (score, tier) = self.decide(distance, name_score.unwrap_or(0.0));

        MatchResult {
            score,
            tier,
            distance_m: Some(distance),
            name_score,
        }
    }

    fn decide(&self, distance: f64, name: f64) -> (f64, MatchTier) {
        let fuzzy = &self.fuzzy;

        if distance < self.distance.exact_m {
            // 50m 內光靠位置就足夠，名稱只決定是否滿分
            if name >= fuzzy.medium {
                (1.0, MatchTier::ExactMatch)
            } else {
                (0.9, MatchTier::ExactLocation)
            }
        } else if distance < self.distance.close_m {
            if name >= fuzzy.high {
                (0.95, MatchTier::CloseMatchHigh)
            } else if name >= fuzzy.medium {
                (0.85, MatchTier::CloseMatchMedium)
            } else if name >= fuzzy.low {
                (0.70, MatchTier::CloseMatchLow)
            } else {
                (0.0, MatchTier::CloseNoNameMatch)
            }
        } else if name >= fuzzy.high {
            (0.80, MatchTier::NearMatch)
        } else {
            (0.0, MatchTier::NearNoNameMatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MatchBand;

    // 緯度 1 度約 111.2 km
    const DEG_PER_100M: f64 = 100.0 / 111_195.0;

    fn scorer() -> MatchScorer {
        MatchScorer::new(&MatchConfig::default())
    }

    fn place(name: &str, lat: f64, lon: f64, source: &str) -> LocationRecord {
        LocationRecord::new(format!("{}_{}", source, name), name, source).with_coordinates(lat, lon)
    }

    #[test]
    fn test_haversine_known_distance() {
        // Halle (Saale) -> Leipzig，約 33 km
        let d = haversine_distance(51.4969, 11.9688, 51.3397, 12.3731);
        assert!((d - 33_000.0).abs() < 1_000.0, "unexpected distance {}", d);
        assert_eq!(haversine_distance(51.0, 11.0, 51.0, 11.0), 0.0);
    }

    #[test]
    fn test_normalize_strips_generic_words_and_symbols() {
        let normalizer = NameNormalizer::new(&MatchConfig::default().generic_name_words);
        assert_eq!(normalizer.normalize("Schloss Mansfeld"), "mansfeld");
        assert_eq!(normalizer.normalize("Mansfeld Castle"), "mansfeld");
        assert_eq!(normalizer.normalize("  St.-Andreas  Kirche "), "st andreas");
        assert_eq!(normalizer.normalize("Das Museum"), "");
        // 只去掉完整的字，不會切掉字中的片段
        assert_eq!(normalizer.normalize("Badeborn"), "badeborn");
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn test_castle_scenario_is_exact_match() {
        let seed = place("Schloss Mansfeld", 51.5972, 11.4528, "seed");
        let osm = place("Mansfeld Castle", 51.5973, 11.4529, "osm");

        let result = scorer().score(&seed, &osm);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.tier, MatchTier::ExactMatch);
        assert!(result.reason().starts_with("exact_match"));
        assert!(result.distance_m.unwrap() < 20.0);
    }

    #[test]
    fn test_identical_record_scores_exact() {
        let a = place("Lutherhaus", 51.5283, 11.5475, "osm");
        let result = scorer().score(&a, &a);
        assert!(result.score >= 0.9);
        assert!(result.reason().contains("exact"));
    }

    #[test]
    fn test_far_apart_is_zero_even_with_same_name() {
        let a = place("Lutherhaus", 51.5283, 11.5475, "seed");
        let b = place("Lutherhaus", 51.5283 + 6.0 * DEG_PER_100M, 11.5475, "osm");

        let result = scorer().score(&a, &b);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.tier, MatchTier::TooFar);
        assert!(result.reason().starts_with("too_far"));
    }

    #[test]
    fn test_close_with_dissimilar_names_is_not_duplicate() {
        let a = place("Lutherhaus", 51.5283, 11.5475, "seed");
        let b = place("Stadtbibliothek", 51.5283 + DEG_PER_100M, 11.5475, "osm");

        let result = scorer().score(&a, &b);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.tier, MatchTier::CloseNoNameMatch);
        assert_eq!(result.tier.band(), Some(MatchBand::Close));
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn test_close_with_matching_names() {
        let a = place("Marktkirche St. Andreas", 51.5283, 11.5475, "seed");
        let b = place("Marktkirche St Andreas", 51.5283 + DEG_PER_100M, 11.5475, "osm");

        let result = scorer().score(&a, &b);
        assert_eq!(result.score, 0.95);
        assert_eq!(result.tier, MatchTier::CloseMatchHigh);
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn test_near_band_requires_high_name_score() {
        let base = place("Stadtpark Hettstedt", 51.6450, 11.5110, "seed");
        let same = place("Stadtpark Hettstedt", 51.6450 + 3.0 * DEG_PER_100M, 11.5110, "osm");
        let similar = place(
            "Stadtpark Hettstedt Nord",
            51.6450 + 3.0 * DEG_PER_100M,
            11.5110,
            "osm",
        );

        let s = scorer();
        let exact_name = s.score(&base, &same);
        assert_eq!(exact_name.score, 0.80);
        assert_eq!(exact_name.tier, MatchTier::NearMatch);

        let partial = s.score(&base, &similar);
        assert!(partial.name_score.unwrap() >= 75.0 && partial.name_score.unwrap() < 90.0);
        assert_eq!(partial.score, 0.0);
        assert_eq!(partial.tier, MatchTier::NearNoNameMatch);
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn test_name_similarity_is_indel_ratio() {
        let s = scorer();
        // 2 * 10 / (10 + 19)，長度不同時與編輯距離比例不同
        let ratio = s.name_similarity("Lutherhaus", "Lutherhaus Eisleben").unwrap();
        assert!((ratio - 2000.0 / 29.0).abs() < 0.01, "unexpected ratio {}", ratio);
        assert_eq!(s.name_similarity("Schloss Mansfeld", "Mansfeld Castle"), Some(100.0));
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn test_name_extension_within_close_range_matches_low() {
        let a = place("Lutherhaus", 51.5283, 11.5475, "seed");
        let b = place("Lutherhaus Eisleben", 51.5283 + DEG_PER_100M, 11.5475, "osm");

        let result = scorer().score(&a, &b);
        assert_eq!(result.score, 0.70);
        assert_eq!(result.tier, MatchTier::CloseMatchLow);
    }

    #[test]
    fn test_degraded_mode_uses_distance_only() {
        let scorer = MatchScorer::new(&MatchConfig::default().with_fuzzy_matching(false));
        assert!(!scorer.fuzzy_available());

        let a = place("Schloss Mansfeld", 51.5972, 11.4528, "seed");
        let b = place("Schloss Mansfeld", 51.5973, 11.4529, "osm");
        let result = scorer.score(&a, &b);
        assert_eq!(result.score, 0.9);
        assert_eq!(result.tier, MatchTier::ExactLocation);
        assert!(result.name_score.is_none());

        let c = place("Schloss Mansfeld", 51.5972 + DEG_PER_100M, 11.4528, "osm");
        assert_eq!(scorer.score(&a, &c).score, 0.0);
    }

    #[test]
    fn test_missing_coordinates_never_match() {
        let a = place("Lutherhaus", 51.5283, 11.5475, "seed");
        let b = LocationRecord::new("x", "Lutherhaus", "osm");

        let result = scorer().score(&a, &b);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.tier, MatchTier::MissingCoordinates);
    }

    #[test]
    fn test_empty_names_fall_back_to_location() {
        let a = place("", 51.5283, 11.5475, "seed");
        let b = place("Museum", 51.5283, 11.5476, "osm");

        let result = scorer().score(&a, &b);
        assert!(result.name_score.is_none());
        assert_eq!(result.tier, MatchTier::ExactLocation);
    }
}
