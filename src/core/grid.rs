//! 粗格網索引：把 O(n²) 的兩兩比對降到 O(n·k)。

use crate::domain::model::LocationRecord;
use std::collections::HashMap;

pub type CellKey = (i64, i64);

fn cell_key(latitude: f64, longitude: f64, cell_size_deg: f64) -> CellKey {
    (
        (latitude / cell_size_deg).round() as i64,
        (longitude / cell_size_deg).round() as i64,
    )
}

/// 以 cell_size_deg 為格寬的經緯度格網，存的是輸入陣列的索引
#[derive(Debug, Clone)]
pub struct GeoGrid {
    cell_size_deg: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    // 依首次出現的順序走訪格子，讓分組結果可重現
    order: Vec<CellKey>,
    unindexed: Vec<usize>,
}

impl GeoGrid {
    pub fn build(records: &[LocationRecord], cell_size_deg: f64) -> Self {
        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        let mut order = Vec::new();
        let mut unindexed = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match record.coordinates() {
                Some((lat, lon)) => {
                    let key = cell_key(lat, lon, cell_size_deg);
                    let members = cells.entry(key).or_default();
                    if members.is_empty() {
                        order.push(key);
                    }
                    members.push(index);
                }
                None => unindexed.push(index),
            }
        }

        let grid = Self {
            cell_size_deg,
            cells,
            order,
            unindexed,
        };

        tracing::debug!(
            "Grid built: {} cells, {} records without coordinates",
            grid.cells.len(),
            grid.unindexed.len()
        );

        grid
    }

    pub fn cell_key(&self, latitude: f64, longitude: f64) -> CellKey {
        cell_key(latitude, longitude, self.cell_size_deg)
    }

    /// 中心格加上八個鄰格內的所有記錄（依 dlat、dlon 由 -1 到 1 的順序）
    pub fn candidates(&self, key: CellKey) -> Vec<usize> {
        let mut result = Vec::new();
        for dlat in -1..=1 {
            for dlon in -1..=1 {
                let neighbour = (key.0.saturating_add(dlat), key.1.saturating_add(dlon));
                if let Some(members) = self.cells.get(&neighbour) {
                    result.extend_from_slice(members);
                }
            }
        }
        result
    }

    /// 依首次出現的順序回傳 (格子, 格內記錄)
    pub fn cells(&self) -> impl Iterator<Item = (CellKey, &[usize])> + '_ {
        self.order
            .iter()
            .map(move |key| (*key, self.cells[key].as_slice()))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn indexed_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// 沒有座標、不參與空間比對的記錄
    pub fn unindexed(&self) -> &[usize] {
        &self.unindexed
    }
}
