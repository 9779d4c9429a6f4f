//! # corate
//!
//! Item-to-item Pearson similarity over sparse ratings, and threshold-filtered
//! nearest-neighbour lists per item.
//!
//! The pipeline runs in two phases over an explicit, immutable snapshot:
//!
//! 1. `index`: ratings are transposed into a frozen item-major index.
//! 2. `similarity` + `neighbors`: a pure, parallel pass over that index emits
//!    positive Pearson correlations, which are fanned out to both endpoint items,
//!    filtered by the configured `threshold` policy and ranked.
//!
//! ```
//! use corate::builder::ItemKnnBuilder;
//! use corate::core::Rating;
//!
//! let ratings = vec![
//!     Rating::new(1, 10, 5.0), Rating::new(1, 20, 4.0),
//!     Rating::new(2, 10, 3.0), Rating::new(2, 20, 2.0),
//!     Rating::new(3, 10, 4.0), Rating::new(3, 20, 5.0),
//! ];
//!
//! let knn = ItemKnnBuilder::new().with_threshold(0.5).build(ratings).unwrap();
//! assert_eq!(knn.neighbors_of(10).unwrap().neighbor_ids(), vec![20]);
//! assert_eq!(knn.neighbors_of(20).unwrap().neighbor_ids(), vec![10]);
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod error;
pub mod index;
pub mod neighbors;
pub mod records;
pub mod similarity;
pub mod threshold;

pub use crate::builder::{ItemKnn, ItemKnnBuilder};
pub use crate::config::KnnConfig;
pub use crate::error::{KnnError, KnnResult};

#[cfg(test)]
mod tests;
