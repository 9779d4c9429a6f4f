//! Threshold-filtered neighbour lists.
//!
//! Every similarity pair `(A, B, s)` is visible from both endpoints: it contributes
//! `(owner=A, neighbor=B, s)` and `(owner=B, neighbor=A, s)`. Contributions are
//! grouped by owner, filtered with `similarity >= threshold`, ranked by similarity
//! descending (ties by neighbour id ascending) and optionally cut to the top `k`.
//!
//! Each owner's list is finished before it is inserted into the output map, so a
//! caller never observes a partially aggregated list. An owner whose contributions
//! are all below the threshold still gets an (empty) entry.

use std::collections::BTreeMap;

use dashmap::DashMap;
use log::{debug, info};
use rayon::prelude::*;

use crate::core::{ItemId, NeighborEntry, NeighborList, SimilarityPair};
use crate::error::{KnnError, KnnResult};
use crate::threshold::DEFAULT_THRESHOLD;

/// Output of the aggregation: one list per owner item, ascending by item id.
pub type NeighborMap = BTreeMap<ItemId, NeighborList>;

#[derive(Clone, Debug)]
pub struct NeighborAggregator {
    threshold: f64,
    max_neighbors: Option<usize>,
    parallel: bool,
}

impl Default for NeighborAggregator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_neighbors: None,
            parallel: true,
        }
    }
}

impl NeighborAggregator {
    pub fn new(threshold: f64) -> KnnResult<Self> {
        if !threshold.is_finite() {
            return Err(KnnError::InvalidConfig(format!(
                "neighbour threshold must be finite, got {threshold}"
            )));
        }
        Ok(Self {
            threshold,
            ..Self::default()
        })
    }

    /// Keep at most `k` neighbours per item (the `k` most similar).
    pub fn with_max_neighbors(mut self, k: Option<usize>) -> Self {
        self.max_neighbors = k;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_neighbors(&self) -> Option<usize> {
        self.max_neighbors
    }

    pub fn aggregate(&self, pairs: &[SimilarityPair]) -> NeighborMap {
        info!(
            "Aggregating {} similarity pairs (threshold={}, max_neighbors={:?})",
            pairs.len(),
            self.threshold,
            self.max_neighbors
        );

        let out = if self.parallel {
            self.aggregate_par(pairs)
        } else {
            self.aggregate_seq(pairs)
        };

        let kept: usize = out.values().map(|l| l.len()).sum();
        let empty = out.values().filter(|l| l.is_empty()).count();
        info!(
            "Aggregation done: {} owners, {} neighbour entries kept, {} empty lists",
            out.len(),
            kept,
            empty
        );
        out
    }

    fn aggregate_seq(&self, pairs: &[SimilarityPair]) -> NeighborMap {
        let mut grouped: BTreeMap<ItemId, Vec<NeighborEntry>> = BTreeMap::new();
        for pair in pairs {
            for (owner, entry) in pair.fan_out() {
                grouped.entry(owner).or_default().push(entry);
            }
        }
        debug!("Grouped contributions into {} owners", grouped.len());

        grouped
            .into_iter()
            .map(|(owner, candidates)| (owner, self.finish(candidates)))
            .collect()
    }

    fn aggregate_par(&self, pairs: &[SimilarityPair]) -> NeighborMap {
        let grouped: DashMap<ItemId, Vec<NeighborEntry>> = DashMap::new();
        pairs.par_iter().for_each(|pair| {
            for (owner, entry) in pair.fan_out() {
                grouped.entry(owner).or_default().push(entry);
            }
        });
        debug!("Grouped contributions into {} owners [parallel]", grouped.len());

        let groups: Vec<(ItemId, Vec<NeighborEntry>)> = grouped.into_iter().collect();
        groups
            .into_par_iter()
            .map(|(owner, candidates)| (owner, self.finish(candidates)))
            .collect()
    }

    /// Filter, rank and bound the candidates of one owner.
    fn finish(&self, mut candidates: Vec<NeighborEntry>) -> NeighborList {
        candidates.retain(|e| e.similarity >= self.threshold);
        candidates.sort_unstable_by(NeighborEntry::rank_cmp);
        if let Some(k) = self.max_neighbors {
            candidates.truncate(k);
        }
        NeighborList::from_sorted(candidates)
    }
}

/// Aggregates `pairs` into per-item neighbour lists with the given threshold.
pub fn aggregate(pairs: &[SimilarityPair], threshold: f64) -> KnnResult<NeighborMap> {
    Ok(NeighborAggregator::new(threshold)?.aggregate(pairs))
}
