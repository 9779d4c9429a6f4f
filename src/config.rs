use serde::{Deserialize, Serialize};

use crate::error::{KnnError, KnnResult};
use crate::similarity::{SimilarityParams, MIN_CO_RATINGS};
use crate::threshold::ThresholdPolicy;

/// Run configuration of the item-kNN pipeline.
///
/// Deserialises from any serde format; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// Cutoff for retaining a neighbour (`similarity >= threshold`).
    pub threshold: ThresholdPolicy,
    /// Fewest co-rated users a similarity may be computed from (at least 2).
    pub min_co_ratings: usize,
    /// Refuse indices with more items than this instead of running out of memory.
    pub max_items: Option<usize>,
    /// Bound on the length of each neighbour list.
    pub max_neighbors: Option<usize>,
    pub parallel: bool,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdPolicy::default(),
            min_co_ratings: MIN_CO_RATINGS,
            max_items: None,
            max_neighbors: None,
            parallel: true,
        }
    }
}

impl KnnConfig {
    pub fn validate(&self) -> KnnResult<()> {
        self.threshold.validate()?;
        if self.min_co_ratings < MIN_CO_RATINGS {
            return Err(KnnError::InvalidConfig(format!(
                "min_co_ratings must be at least {MIN_CO_RATINGS}, got {}",
                self.min_co_ratings
            )));
        }
        if self.max_items == Some(0) {
            return Err(KnnError::InvalidConfig("max_items must be positive".into()));
        }
        if self.max_neighbors == Some(0) {
            return Err(KnnError::InvalidConfig(
                "max_neighbors must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn similarity_params(&self) -> SimilarityParams {
        SimilarityParams {
            min_co_ratings: self.min_co_ratings,
            max_items: self.max_items,
            parallel: self.parallel,
        }
    }
}
