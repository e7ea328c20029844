//! 由兩兩分數把記錄分成重複群組。
//!
//! `GreedyGrouper` 是預設：每筆未處理的記錄吸收它鄰格中達門檻的候選，
//! 被吸收的記錄不會再當組頭，所以 A~B、B~C 但 A!~C 時 C 不一定會進同一組。
//! `UnionFindGrouper` 做遞移閉包，鏈狀相符會併成一組。

use crate::config::matching::GroupingStrategy;
use crate::core::grid::GeoGrid;
use crate::core::scorer::MatchScorer;
use crate::domain::model::{LocationRecord, MatchResult};
use std::collections::HashMap;

/// 被接受的一對比對（索引指向輸入陣列）
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedMatch {
    pub head: usize,
    pub member: usize,
    pub result: MatchResult,
}

/// 兩筆以上記錄組成的重複群組
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCluster {
    pub members: Vec<usize>,
    pub matches: Vec<AcceptedMatch>,
}

#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub clusters: Vec<DuplicateCluster>,
}

impl Grouping {
    /// 被併掉的記錄數（每組 len - 1）
    pub fn duplicates_found(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len() - 1).sum()
    }

    pub fn matches(&self) -> impl Iterator<Item = &AcceptedMatch> {
        self.clusters.iter().flat_map(|c| c.matches.iter())
    }

    pub fn grouped_mask(&self, len: usize) -> Vec<bool> {
        let mut mask = vec![false; len];
        for cluster in &self.clusters {
            for &index in &cluster.members {
                mask[index] = true;
            }
        }
        mask
    }
}

pub trait Grouper {
    fn name(&self) -> &'static str;

    fn group(
        &self,
        records: &[LocationRecord],
        grid: &GeoGrid,
        scorer: &MatchScorer,
        min_score: f64,
    ) -> Grouping;
}

pub fn grouper_for(strategy: GroupingStrategy) -> Box<dyn Grouper + Send + Sync> {
    match strategy {
        GroupingStrategy::Greedy => Box::new(GreedyGrouper),
        GroupingStrategy::Transitive => Box::new(UnionFindGrouper),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyGrouper;

impl Grouper for GreedyGrouper {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn group(
        &self,
        records: &[LocationRecord],
        grid: &GeoGrid,
        scorer: &MatchScorer,
        min_score: f64,
    ) -> Grouping {
        let mut visited = vec![false; records.len()];
        let mut clusters = Vec::new();

        for (key, members) in grid.cells() {
            for &head in members {
                if visited[head] {
                    continue;
                }

                let mut cluster = DuplicateCluster {
                    members: vec![head],
                    matches: Vec::new(),
                };

                for candidate in grid.candidates(key) {
                    if candidate == head || visited[candidate] {
                        continue;
                    }

                    let result = scorer.score(&records[head], &records[candidate]);
                    if result.is_duplicate(min_score) {
                        tracing::debug!(
                            "Match {} <- {}: {}",
                            records[head].id,
                            records[candidate].id,
                            result.reason()
                        );
                        visited[candidate] = true;
                        cluster.members.push(candidate);
                        cluster.matches.push(AcceptedMatch {
                            head,
                            member: candidate,
                            result,
                        });
                    }
                }

                visited[head] = true;

                if cluster.members.len() > 1 {
                    clusters.push(cluster);
                }
            }
        }

        Grouping { clusters }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnionFindGrouper;

impl Grouper for UnionFindGrouper {
    fn name(&self) -> &'static str {
        "transitive"
    }

    fn group(
        &self,
        records: &[LocationRecord],
        grid: &GeoGrid,
        scorer: &MatchScorer,
        min_score: f64,
    ) -> Grouping {
        let mut sets = UnionFind::new(records.len());
        let mut accepted = Vec::new();

        for (key, members) in grid.cells() {
            for &head in members {
                for candidate in grid.candidates(key) {
                    // 每一對只算一次
                    if candidate <= head {
                        continue;
                    }

                    let result = scorer.score(&records[head], &records[candidate]);
                    if result.is_duplicate(min_score) && sets.union(head, candidate) {
                        tracing::debug!(
                            "Match {} ~ {}: {}",
                            records[head].id,
                            records[candidate].id,
                            result.reason()
                        );
                        accepted.push(AcceptedMatch {
                            head,
                            member: candidate,
                            result,
                        });
                    }
                }
            }
        }

        // 代表元素是組內最小索引，群組依此排序，組內依輸入順序
        let mut by_root: HashMap<usize, DuplicateCluster> = HashMap::new();
        for index in 0..records.len() {
            let root = sets.find(index);
            by_root
                .entry(root)
                .or_insert_with(|| DuplicateCluster {
                    members: Vec::new(),
                    matches: Vec::new(),
                })
                .members
                .push(index);
        }
        for m in accepted {
            let root = sets.find(m.head);
            if let Some(cluster) = by_root.get_mut(&root) {
                cluster.matches.push(m);
            }
        }

        let mut clusters: Vec<DuplicateCluster> = by_root
            .into_values()
            .filter(|c| c.members.len() > 1)
            .collect();
        clusters.sort_by_key(|c| c.members[0]);

        Grouping { clusters }
    }
}

/// 以最小索引為代表的 disjoint-set
#[derive(Debug)]
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// 不同集合時合併並回傳 true
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (min, max) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[max] = min;
        true
    }
}
