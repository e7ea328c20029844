//! 執行統計與品質報告，只觀察結果，不影響比對或合併。

use crate::core::grid::GeoGrid;
use crate::core::grouper::Grouping;
use crate::domain::model::{LocationRecord, MatchBand, MergedRecord};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

const TOP_CITIES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchBreakdown {
    pub exact_matches: usize,
    pub close_matches: usize,
    pub near_matches: usize,
}

impl MatchBreakdown {
    pub fn from_grouping(grouping: &Grouping) -> Self {
        let mut breakdown = Self::default();
        for accepted in grouping.matches() {
            match accepted.result.tier.band() {
                Some(MatchBand::Exact) => breakdown.exact_matches += 1,
                Some(MatchBand::Close) => breakdown.close_matches += 1,
                Some(MatchBand::Near) => breakdown.near_matches += 1,
                None => {}
            }
        }
        breakdown
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total_input: usize,
    pub indexed: usize,
    pub without_coordinates: usize,
    pub grid_cells: usize,
    pub duplicate_groups: usize,
    pub duplicates_found: usize,
    pub unique_output: usize,
    pub fuzzy_matching: bool,
    pub grouping: String,
    #[serde(flatten)]
    pub matches: MatchBreakdown,
}

impl RunStats {
    pub fn collect(
        total_input: usize,
        grid: &GeoGrid,
        grouping: &Grouping,
        unique_output: usize,
        fuzzy_matching: bool,
        grouper: &str,
    ) -> Self {
        Self {
            total_input,
            indexed: grid.indexed_count(),
            without_coordinates: grid.unindexed().len(),
            grid_cells: grid.cell_count(),
            duplicate_groups: grouping.clusters.len(),
            duplicates_found: grouping.duplicates_found(),
            unique_output,
            fuzzy_matching,
            grouping: grouper.to_string(),
            matches: MatchBreakdown::from_grouping(grouping),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "📊 Deduplication: {} in, {} unique, {} duplicates removed in {} groups",
            self.total_input,
            self.unique_output,
            self.duplicates_found,
            self.duplicate_groups
        );
        tracing::info!(
            "📐 Grid: {} cells, {} records without coordinates",
            self.grid_cells,
            self.without_coordinates
        );
        tracing::info!(
            "🔗 Matches - exact: {}, close: {}, near: {} (grouping: {}, fuzzy: {})",
            self.matches.exact_matches,
            self.matches.close_matches,
            self.matches.near_matches,
            self.grouping,
            if self.fuzzy_matching { "on" } else { "off" }
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub multi_source_count: usize,
    pub multi_source_percentage: f64,
    pub duplicates_removed: usize,
    pub deduplication_rate: f64,
    pub without_coordinates: usize,
    pub fuzzy_matching: bool,
}

/// 合併結果的分布報告（來源、類別、城市）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_input: usize,
    pub total_locations: usize,
    pub source_distribution: BTreeMap<String, usize>,
    #[serde(serialize_with = "ordered_counts")]
    pub category_distribution: Vec<(String, usize)>,
    #[serde(serialize_with = "ordered_counts")]
    pub city_distribution: Vec<(String, usize)>,
    pub quality_metrics: QualityMetrics,
    pub match_breakdown: MatchBreakdown,
}

impl QualityReport {
    pub fn build(input: &[LocationRecord], output: &[MergedRecord], stats: &RunStats) -> Self {
        let mut source_distribution = BTreeMap::new();
        for record in input {
            *source_distribution.entry(record.source.clone()).or_insert(0) += 1;
        }

        let mut categories: HashMap<String, usize> = HashMap::new();
        let mut cities: HashMap<String, usize> = HashMap::new();
        let mut multi_source_count = 0;

        for merged in output {
            let category = if merged.record.category.is_empty() {
                "other".to_string()
            } else {
                merged.record.category.clone()
            };
            *categories.entry(category).or_insert(0) += 1;

            // 空的城市不計
            if let Some(city) = merged.record.attributes.get_str("city").filter(|c| !c.is_empty()) {
                *cities.entry(city.to_string()).or_insert(0) += 1;
            }

            if merged.is_multi_source() {
                multi_source_count += 1;
            }
        }

        let mut city_distribution = sorted_counts(cities);
        city_distribution.truncate(TOP_CITIES);

        Self {
            total_input: input.len(),
            total_locations: output.len(),
            source_distribution,
            category_distribution: sorted_counts(categories),
            city_distribution,
            quality_metrics: QualityMetrics {
                multi_source_count,
                multi_source_percentage: percentage(multi_source_count, output.len()),
                duplicates_removed: stats.duplicates_found,
                deduplication_rate: percentage(stats.duplicates_found, input.len()),
                without_coordinates: stats.without_coordinates,
                fuzzy_matching: stats.fuzzy_matching,
            },
            match_breakdown: stats.matches.clone(),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "📈 Deduplication rate: {:.1}%, multi-source locations: {} ({:.1}%)",
            self.quality_metrics.deduplication_rate,
            self.quality_metrics.multi_source_count,
            self.quality_metrics.multi_source_percentage
        );
        for (category, count) in self.category_distribution.iter().take(10) {
            tracing::debug!("   {:15} {:5}", category, count);
        }
    }
}

/// 依數量遞減排序，數量相同時依名稱
fn sorted_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

fn ordered_counts<S>(entries: &[(String, usize)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
}
