//! Rating and neighbour types shared by every stage of the pipeline.
//!
//! This module provides the value types that flow between the stages:
//!
//! - Rating: one `(user, item, score)` observation, as decoded by the boundary readers.
//! - UserRatings: the transient per-user rating vector used while ingesting.
//! - SimilarityPair: a canonical unordered item pair with its Pearson score.
//! - NeighborEntry / NeighborList: the final per-item, threshold-filtered output.
//!
//! Design goals:
//! - Plain `Copy` records for the hot path (pairs and entries are 24 and 16 bytes).
//! - A single ranking order (`NeighborEntry::rank_cmp`) used wherever lists are sorted,
//!   so output is reproducible across runs and thread counts.
//!
//! # Examples
//!
//! ```
//! use corate::core::{NeighborEntry, NeighborList, SimilarityPair};
//!
//! // pairs are canonicalised so that item_a < item_b
//! let p = SimilarityPair::new(9, 4, 0.8);
//! assert_eq!((p.item_a, p.item_b), (4, 9));
//!
//! let list = NeighborList::from_sorted(vec![
//!     NeighborEntry::new(9, 0.8),
//!     NeighborEntry::new(2, 0.5),
//! ]);
//! assert_eq!(list.to_string(), "9:0.8,2:0.5");
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type ItemId = u64;
pub type UserId = u64;

/// One observed rating. Immutable once decoded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user: UserId,
    pub item: ItemId,
    pub score: f64,
}

impl Rating {
    pub fn new(user: UserId, item: ItemId, score: f64) -> Self {
        Self { user, item, score }
    }

    /// Scores must be finite to take part in a correlation.
    pub fn is_valid(&self) -> bool {
        self.score.is_finite()
    }
}

/// All ratings of a single user, keyed by item.
///
/// Keys are unique: inserting an item twice keeps the later score.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserRatings {
    pub user: UserId,
    pub items: BTreeMap<ItemId, f64>,
}

impl UserRatings {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            items: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, item: ItemId, score: f64) {
        self.items.insert(item, score);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flatten into individual ratings, ascending by item.
    pub fn ratings(&self) -> impl Iterator<Item = Rating> + '_ {
        self.items
            .iter()
            .map(move |(&item, &score)| Rating::new(self.user, item, score))
    }
}

/// Similarity between two distinct items. `item_a < item_b` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPair {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub score: f64,
}

impl SimilarityPair {
    /// Builds the canonical form of the unordered pair `{a, b}`.
    pub fn new(a: ItemId, b: ItemId, score: f64) -> Self {
        debug_assert_ne!(a, b, "a similarity pair needs two distinct items");
        let (item_a, item_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            item_a,
            item_b,
            score,
        }
    }

    /// The endpoint opposite to `item`, if `item` is an endpoint.
    pub fn other(&self, item: ItemId) -> Option<ItemId> {
        if item == self.item_a {
            Some(self.item_b)
        } else if item == self.item_b {
            Some(self.item_a)
        } else {
            None
        }
    }

    /// The two directed contributions `(owner, entry)` of this pair.
    pub fn fan_out(&self) -> [(ItemId, NeighborEntry); 2] {
        [
            (self.item_a, NeighborEntry::new(self.item_b, self.score)),
            (self.item_b, NeighborEntry::new(self.item_a, self.score)),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub neighbor: ItemId,
    pub similarity: f64,
}

impl NeighborEntry {
    pub fn new(neighbor: ItemId, similarity: f64) -> Self {
        Self {
            neighbor,
            similarity,
        }
    }

    /// Ranking order: similarity descending, then neighbour id ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .similarity
            .partial_cmp(&self.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.neighbor.cmp(&other.neighbor))
    }
}

impl fmt::Display for NeighborEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.neighbor, self.similarity)
    }
}

/// Ranked neighbours of one item. May be empty.
/// Constructed through `from_sorted` only.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NeighborList {
    entries: Vec<NeighborEntry>,
}

impl NeighborList {
    /// Wraps entries that are already in ranking order.
    pub fn from_sorted(entries: Vec<NeighborEntry>) -> Self {
        debug_assert!(
            entries
                .windows(2)
                .all(|w| w[0].rank_cmp(&w[1]) != Ordering::Greater),
            "neighbour entries must be in ranking order"
        );
        Self { entries }
    }

    pub fn entries(&self) -> &[NeighborEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NeighborEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn neighbor_ids(&self) -> Vec<ItemId> {
        self.entries.iter().map(|e| e.neighbor).collect()
    }

    pub fn similarity_of(&self, neighbor: ItemId) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.neighbor == neighbor)
            .map(|e| e.similarity)
    }
}

impl<'a> IntoIterator for &'a NeighborList {
    type Item = &'a NeighborEntry;
    type IntoIter = std::slice::Iter<'a, NeighborEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// `neighborId:similarity` tokens joined by commas, no trailing separator.
impl fmt::Display for NeighborList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
