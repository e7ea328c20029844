use crate::config::matching::MatchConfig;
use crate::core::grid::GeoGrid;
use crate::core::grouper::{grouper_for, Grouper};
use crate::core::merger::RecordMerger;
use crate::core::scorer::MatchScorer;
use crate::core::stats::RunStats;
use crate::domain::model::{DuplicateGroupReport, LocationRecord, MergedRecord};
use crate::utils::error::Result;
use crate::utils::validation::Validate;

/// 一次去重的結果：合併後的唯一記錄、重複群組報告與統計
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub unique_records: Vec<MergedRecord>,
    pub duplicate_groups: Vec<DuplicateGroupReport>,
    pub stats: RunStats,
}

/// 去重引擎：格網 -> 分組 -> 合併。每次呼叫都是獨立的批次，不保留狀態。
pub struct DedupEngine {
    config: MatchConfig,
    scorer: MatchScorer,
    grouper: Box<dyn Grouper + Send + Sync>,
}

impl DedupEngine {
    /// 設定不合法時直接失敗，不會等到處理中途
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scorer: MatchScorer::new(&config),
            grouper: grouper_for(config.grouping),
            config,
        })
    }

    pub fn with_grouper(mut self, grouper: Box<dyn Grouper + Send + Sync>) -> Self {
        self.grouper = grouper;
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    pub fn deduplicate(&self, records: &[LocationRecord]) -> Result<DedupOutcome> {
        tracing::info!(
            "🔍 Duplicate detection: {} locations (min score {:.2}, grouping {})",
            records.len(),
            self.config.min_score,
            self.grouper.name()
        );

        let fuzzy = self.scorer.fuzzy_available();
        if !fuzzy {
            tracing::warn!(
                "⚠️  Fuzzy name matching unavailable, falling back to distance-only tiers"
            );
        }

        let grid = GeoGrid::build(records, self.config.cell_size_deg);
        if !grid.unindexed().is_empty() {
            tracing::warn!(
                "⚠️  {} records without coordinates are passed through unmatched",
                grid.unindexed().len()
            );
        }

        let grouping = self
            .grouper
            .group(records, &grid, &self.scorer, self.config.min_score);

        let merger = RecordMerger::new(&self.config);
        let mut unique_records = Vec::with_capacity(records.len());
        let mut duplicate_groups = Vec::with_capacity(grouping.clusters.len());

        // 先輸出合併後的群組，再依輸入順序輸出單筆記錄
        for cluster in &grouping.clusters {
            let members: Vec<&LocationRecord> =
                cluster.members.iter().map(|&i| &records[i]).collect();
            let merged = merger.merge(&members)?;

            duplicate_groups.push(DuplicateGroupReport {
                merged_id: merged.record.id.clone(),
                merged_name: merged.record.name.clone(),
                sources: merged.sources.clone(),
                original_count: members.len(),
                original_ids: merged.original_ids.clone(),
                match_reasons: cluster.matches.iter().map(|m| m.result.reason()).collect(),
            });
            unique_records.push(merged);
        }

        let grouped = grouping.grouped_mask(records.len());
        for (index, record) in records.iter().enumerate() {
            if !grouped[index] {
                unique_records.push(merger.merge(std::slice::from_ref(&record))?);
            }
        }

        let stats = RunStats::collect(
            records.len(),
            &grid,
            &grouping,
            unique_records.len(),
            fuzzy,
            self.grouper.name(),
        );
        stats.log_summary();

        Ok(DedupOutcome {
            unique_records,
            duplicate_groups,
            stats,
        })
    }
}
