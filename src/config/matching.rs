use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_ordered, validate_positive_f64, validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 緯度方向每度約略的公尺數
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum GroupingStrategy {
    /// 單次貪婪分組，不做遞移閉包
    #[default]
    Greedy,
    /// union-find，鏈狀相符的記錄會併成同一組
    Transitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceThresholds {
    pub exact_m: f64,
    pub close_m: f64,
    pub near_m: f64,
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self {
            exact_m: 50.0,
            close_m: 150.0,
            near_m: 500.0,
        }
    }
}

/// 名稱相似度門檻（0-100）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for FuzzyThresholds {
    fn default() -> Self {
        Self {
            high: 90.0,
            medium: 75.0,
            low: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub min_score: f64,
    pub distance: DistanceThresholds,
    pub fuzzy: FuzzyThresholds,
    pub source_priority: BTreeMap<String, i32>,
    pub cell_size_deg: f64,
    pub generic_name_words: Vec<String>,
    pub fuzzy_matching: bool,
    pub grouping: GroupingStrategy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_score: 0.70,
            distance: DistanceThresholds::default(),
            fuzzy: FuzzyThresholds::default(),
            source_priority: default_source_priority(),
            cell_size_deg: 0.01,
            generic_name_words: default_generic_name_words(),
            fuzzy_matching: true,
            grouping: GroupingStrategy::Greedy,
        }
    }
}

fn default_source_priority() -> BTreeMap<String, i32> {
    // 人工整理 > 結構化資料 > 社群資料
    [("seed", 3), ("wikidata", 2), ("osm", 1)]
        .into_iter()
        .map(|(source, priority)| (source.to_string(), priority))
        .collect()
}

fn default_generic_name_words() -> Vec<String> {
    [
        "museum", "schloss", "burg", "spielplatz", "bad", "freibad", "schwimmbad", "tierpark",
        "zoo", "park", "kirche", "ruine", "castle", "church", "playground", "pool", "ruin", "the",
        "der", "die", "das",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

impl MatchConfig {
    /// 未列出的來源優先權為 0
    pub fn priority(&self, source: &str) -> i32 {
        self.source_priority.get(source).copied().unwrap_or(0)
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_grouping(mut self, grouping: GroupingStrategy) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_fuzzy_matching(mut self, enabled: bool) -> Self {
        self.fuzzy_matching = enabled;
        self
    }

    /// 格網在南北方向的寬度（公尺）
    pub fn cell_width_m(&self) -> f64 {
        self.cell_size_deg * METERS_PER_DEGREE_LAT
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_range("matching.min_score", self.min_score, 0.0, 1.0)?;

        validate_positive_f64("matching.distance.exact_m", self.distance.exact_m)?;
        validate_positive_f64("matching.distance.close_m", self.distance.close_m)?;
        validate_positive_f64("matching.distance.near_m", self.distance.near_m)?;
        validate_ordered(
            "matching.distance.exact_m",
            self.distance.exact_m,
            "matching.distance.close_m",
            self.distance.close_m,
            true,
        )?;
        validate_ordered(
            "matching.distance.close_m",
            self.distance.close_m,
            "matching.distance.near_m",
            self.distance.near_m,
            false,
        )?;

        validate_range("matching.fuzzy.high", self.fuzzy.high, 0.0, 100.0)?;
        validate_range("matching.fuzzy.medium", self.fuzzy.medium, 0.0, 100.0)?;
        validate_range("matching.fuzzy.low", self.fuzzy.low, 0.0, 100.0)?;
        validate_ordered(
            "matching.fuzzy.low",
            self.fuzzy.low,
            "matching.fuzzy.medium",
            self.fuzzy.medium,
            false,
        )?;
        validate_ordered(
            "matching.fuzzy.medium",
            self.fuzzy.medium,
            "matching.fuzzy.high",
            self.fuzzy.high,
            false,
        )?;

        validate_positive_f64("matching.cell_size_deg", self.cell_size_deg)?;
        // 3x3 鄰格保證：格寬必須大於最大比對半徑
        if self.cell_width_m() < self.distance.near_m {
            return Err(EtlError::InvalidConfigValueError {
                field: "matching.cell_size_deg".to_string(),
                value: self.cell_size_deg.to_string(),
                reason: format!(
                    "Cell width ({:.0}m) must be at least the near distance ({:.0}m)",
                    self.cell_width_m(),
                    self.distance.near_m
                ),
            });
        }

        if self.generic_name_words.iter().any(|w| w.trim().is_empty()) {
            return Err(EtlError::InvalidConfigValueError {
                field: "matching.generic_name_words".to_string(),
                value: String::new(),
                reason: "Generic name words cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Validate for MatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
