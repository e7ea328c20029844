use crate::config::matching::MatchConfig;
use crate::domain::model::{LocationRecord, MergedRecord};
use crate::utils::error::{EtlError, Result};
use std::cmp::Reverse;

/// 合併時重新產生、不沿用輸入值的欄位
const DERIVED_FIELDS: [&str; 2] = ["original_ids", "sources"];

const UNKNOWN_SOURCE: &str = "unknown";

/// 依來源優先權把一組重複記錄收斂成一筆
#[derive(Debug, Clone, Copy)]
pub struct RecordMerger<'a> {
    config: &'a MatchConfig,
}

impl<'a> RecordMerger<'a> {
    pub fn new(config: &'a MatchConfig) -> Self {
        Self { config }
    }

    pub fn merge(&self, group: &[&LocationRecord]) -> Result<MergedRecord> {
        if group.is_empty() {
            return Err(EtlError::InvariantViolation {
                message: "cannot merge an empty duplicate group".to_string(),
            });
        }

        // 穩定排序：同優先權維持原本順序
        let mut sorted: Vec<&LocationRecord> = group.to_vec();
        sorted.sort_by_key(|record| Reverse(self.config.priority(&record.source)));

        let mut merged = sorted[0].clone();
        let original_ids: Vec<String> = sorted.iter().map(|r| r.id.clone()).collect();
        let mut sources: Vec<String> = Vec::new();
        for record in &sorted {
            let source = if record.source.is_empty() {
                UNKNOWN_SOURCE
            } else {
                record.source.as_str()
            };
            if !sources.iter().any(|s| s == source) {
                sources.push(source.to_string());
            }
        }

        for lower in &sorted[1..] {
            fill_core_fields(&mut merged, lower);
            merged.attributes.fill_from(&lower.attributes);
        }

        for field in DERIVED_FIELDS {
            merged.attributes.remove(field);
        }

        if sources.len() > 1 {
            merged.id = format!("merged_{}", original_ids[0]);
        }

        Ok(MergedRecord {
            record: merged,
            original_ids,
            sources,
        })
    }
}

fn fill_core_fields(merged: &mut LocationRecord, lower: &LocationRecord) {
    if merged.id.is_empty() {
        merged.id = lower.id.clone();
    }
    if merged.name.is_empty() {
        merged.name = lower.name.clone();
    }
    if merged.category.is_empty() {
        merged.category = lower.category.clone();
    }
    if merged.source.is_empty() {
        merged.source = lower.source.clone();
    }
    if merged.latitude.is_none() {
        merged.latitude = lower.latitude;
    }
    if merged.longitude.is_none() {
        merged.longitude = lower.longitude;
    }
}
