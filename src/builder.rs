use std::collections::BTreeMap;
use std::io::Write;

use crate::config::KnnConfig;
use crate::core::{ItemId, NeighborList, Rating, SimilarityPair};
use crate::error::KnnResult;
use crate::index::{build_index, build_index_par, ItemRatingIndex};
use crate::neighbors::{NeighborAggregator, NeighborMap};
use crate::records;
use crate::similarity::{compute_similarities_with, PairStats};
use crate::threshold::ThresholdPolicy;

// Add logging
use log::{debug, info, trace};

/// Result of one pipeline run.
#[derive(Clone, Debug)]
pub struct ItemKnn {
    pairs: Vec<SimilarityPair>,
    neighbors: NeighborMap,
    threshold: f64,
    pub pair_stats: PairStats,
    pub n_items: usize,
    pub n_users: usize,
    pub n_ratings: usize,
}

impl ItemKnn {
    /// Positive similarities, ascending by `(item_a, item_b)`.
    pub fn pairs(&self) -> &[SimilarityPair] {
        &self.pairs
    }

    pub fn neighbors(&self) -> &BTreeMap<ItemId, NeighborList> {
        &self.neighbors
    }

    pub fn neighbors_of(&self, item: ItemId) -> Option<&NeighborList> {
        self.neighbors.get(&item)
    }

    /// The cutoff the policy resolved to for this run.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn into_parts(self) -> (Vec<SimilarityPair>, NeighborMap) {
        (self.pairs, self.neighbors)
    }

    pub fn write_pairs<W: Write>(&self, w: W) -> KnnResult<()> {
        records::write_pairs(w, &self.pairs)
    }

    pub fn write_neighbor_rows<W: Write>(&self, w: W) -> KnnResult<()> {
        records::write_neighbor_rows(w, &self.neighbors)
    }
}

pub struct ItemKnnBuilder {
    config: KnnConfig,
}

impl Default for ItemKnnBuilder {
    fn default() -> Self {
        debug!("Creating ItemKnnBuilder with default parameters");
        Self {
            config: KnnConfig::default(),
        }
    }
}

impl ItemKnnBuilder {
    pub fn new() -> Self {
        info!("Initializing new ItemKnnBuilder");
        Self::default()
    }

    pub fn from_config(config: KnnConfig) -> Self {
        info!("Initializing ItemKnnBuilder from config: {:?}", config);
        Self { config }
    }

    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    // -------------------- Neighbour selection --------------------

    /// Fixed cutoff: keep neighbours with `similarity >= threshold`.
    pub fn with_threshold(self, threshold: f64) -> Self {
        self.with_threshold_policy(ThresholdPolicy::Fixed(threshold))
    }

    /// Cutoff resolved from the similarity distribution of the run.
    pub fn with_threshold_policy(mut self, policy: ThresholdPolicy) -> Self {
        info!("Configuring threshold policy: {}", policy);
        self.config.threshold = policy;
        self
    }

    pub fn with_max_neighbors(mut self, k: usize) -> Self {
        info!("Bounding neighbour lists to {} entries", k);
        self.config.max_neighbors = Some(k);
        self
    }

    // -------------------- Similarity pass --------------------

    pub fn with_min_co_ratings(mut self, n: usize) -> Self {
        info!("Setting min co-ratings: {}", n);
        self.config.min_co_ratings = n;
        self
    }

    /// Fail with `CapacityExceeded` when more than `n` items are indexed.
    pub fn with_max_items(mut self, n: usize) -> Self {
        info!("Setting item capacity: {}", n);
        self.config.max_items = Some(n);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        info!("Setting parallel execution: {}", parallel);
        self.config.parallel = parallel;
        self
    }

    // -------------------- Build --------------------

    /// Index the ratings, compute similarities and aggregate neighbour lists.
    pub fn build<I: IntoIterator<Item = Rating>>(&self, ratings: I) -> KnnResult<ItemKnn> {
        self.config.validate()?;

        trace!("Indexing ratings");
        let index = if self.config.parallel {
            let ratings: Vec<Rating> = ratings.into_iter().collect();
            build_index_par(&ratings)
        } else {
            build_index(ratings)
        };
        self.build_from_index(&index)
    }

    /// Runs the similarity and aggregation stages over an existing index.
    pub fn build_from_index(&self, index: &ItemRatingIndex) -> KnnResult<ItemKnn> {
        self.config.validate()?;
        info!(
            "Building item kNN over {} items, {} users, {} ratings",
            index.n_items(),
            index.n_users(),
            index.n_ratings()
        );
        debug!("Build configuration: {:?}", self.config);

        // 1) pairwise similarities
        let (pairs, pair_stats) =
            compute_similarities_with(index, &self.config.similarity_params())?;

        // 2) cutoff
        let threshold = self.config.threshold.resolve(&pairs);
        debug!(
            "Threshold policy {} resolved to {:.6}",
            self.config.threshold, threshold
        );

        // 3) neighbour lists
        let neighbors = NeighborAggregator::new(threshold)?
            .with_max_neighbors(self.config.max_neighbors)
            .with_parallel(self.config.parallel)
            .aggregate(&pairs);

        info!(
            "Item kNN built: {} pairs, {} neighbour lists",
            pairs.len(),
            neighbors.len()
        );
        Ok(ItemKnn {
            pairs,
            neighbors,
            threshold,
            pair_stats,
            n_items: index.n_items(),
            n_users: index.n_users(),
            n_ratings: index.n_ratings(),
        })
    }
}
