//! # Item-major rating index
//!
//! Ratings arrive user by user; the similarity pass needs them item by item.
//! This module performs that transpose once and freezes the result:
//!
//! 1. **Accumulate**: `IndexBuilder` groups ratings into `item -> (user -> score)`.
//!    A repeated `(user, item)` keeps the later score.
//! 2. **Freeze**: users are densely re-indexed in ascending id order and every item
//!    becomes one CSR row (`sprs::CsMat`, rows = items ascending, columns = users).
//!    Column indices within a row are sorted, so two rows can be intersected with a
//!    linear merge.
//! 3. **Transpose**: the user-major CSC copy of the same matrix is kept alongside,
//!    so the items co-rated with a given item are found without scanning all items.
//!
//! The frozen `ItemRatingIndex` is immutable and `Sync`; the similarity pass shares
//! it read-only across rayon workers.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, trace, warn};
use rayon::prelude::*;
use sprs::CsMat;

use crate::core::{ItemId, Rating, UserId};

/// Minimum number of ratings handed to one worker by `build_index_par`.
const PAR_CHUNK_MIN: usize = 4096;

/// Mutable accumulation phase of the index.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    items: BTreeMap<ItemId, BTreeMap<UserId, f64>>,
    seen: usize,
    skipped: usize,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one rating. Ratings with a non-finite score are skipped with a warning.
    pub fn insert(&mut self, rating: Rating) -> bool {
        self.seen += 1;
        if !rating.is_valid() {
            warn!(
                "Skipping rating user={} item={}: score {} is not finite",
                rating.user, rating.item, rating.score
            );
            self.skipped += 1;
            return false;
        }
        self.items
            .entry(rating.item)
            .or_default()
            .insert(rating.user, rating.score);
        true
    }

    pub fn extend<I: IntoIterator<Item = Rating>>(&mut self, ratings: I) {
        for rating in ratings {
            self.insert(rating);
        }
    }

    /// Merges a partial index built from *later* input into this one.
    /// Scores from `later` overwrite ours on collision.
    pub fn merge(mut self, later: IndexBuilder) -> IndexBuilder {
        for (item, users) in later.items {
            self.items.entry(item).or_default().extend(users);
        }
        self.seen += later.seen;
        self.skipped += later.skipped;
        self
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Freezes the accumulated ratings into the CSR/CSC representation.
    pub fn freeze(self) -> ItemRatingIndex {
        let users: BTreeSet<UserId> = self
            .items
            .values()
            .flat_map(|row| row.keys().copied())
            .collect();
        let user_ids: Vec<UserId> = users.into_iter().collect();

        let n_items = self.items.len();
        let n_users = user_ids.len();
        let nnz: usize = self.items.values().map(|row| row.len()).sum();

        let mut item_ids = Vec::with_capacity(n_items);
        let mut indptr = Vec::with_capacity(n_items + 1);
        let mut indices = Vec::with_capacity(nnz);
        let mut data = Vec::with_capacity(nnz);
        indptr.push(0);

        for (item, row) in self.items {
            item_ids.push(item);
            // both sides are sorted by user id, so the column positions come out sorted
            for (user, score) in row {
                let col = user_ids
                    .binary_search(&user)
                    .unwrap_or_else(|_| unreachable!("user {user} collected above"));
                indices.push(col);
                data.push(score);
            }
            indptr.push(indices.len());
        }

        let by_item: CsMat<f64> = CsMat::new((n_items, n_users), indptr, indices, data);
        let by_user: CsMat<f64> = by_item.to_csc();

        debug!(
            "Froze rating index: {} items x {} users, {} ratings ({} skipped)",
            n_items, n_users, nnz, self.skipped
        );

        ItemRatingIndex {
            item_ids,
            user_ids,
            by_item,
            by_user,
            seen: self.seen,
            skipped: self.skipped,
        }
    }
}

/// Frozen `item -> (user -> score)` index.
#[derive(Clone, Debug)]
pub struct ItemRatingIndex {
    item_ids: Vec<ItemId>,
    user_ids: Vec<UserId>,
    // items x users, CSR
    by_item: CsMat<f64>,
    // same matrix, CSC: outer dimension is the user
    by_user: CsMat<f64>,
    seen: usize,
    skipped: usize,
}

/// Builds the index sequentially from any rating stream.
pub fn build_index<I: IntoIterator<Item = Rating>>(ratings: I) -> ItemRatingIndex {
    info!("Building rating index (sequential)");
    let mut builder = IndexBuilder::new();
    builder.extend(ratings);
    let index = builder.freeze();
    info!(
        "Rating index built: {} items, {} users, {} ratings",
        index.n_items(),
        index.n_users(),
        index.n_ratings()
    );
    index
}

/// Builds the index from ordered input chunks in parallel.
///
/// Partial indices are reduced in input order, so the outcome is the same as
/// `build_index` over the same slice, last-write-wins included.
pub fn build_index_par(ratings: &[Rating]) -> ItemRatingIndex {
    let chunk = (ratings.len() / rayon::current_num_threads().max(1)).max(PAR_CHUNK_MIN);
    info!(
        "Building rating index from {} ratings (parallel, chunk={})",
        ratings.len(),
        chunk
    );

    let merged = ratings
        .par_chunks(chunk)
        .map(|part| {
            let mut builder = IndexBuilder::new();
            builder.extend(part.iter().copied());
            trace!("Partial index over {} ratings: {} items", part.len(), builder.n_items());
            builder
        })
        .reduce(IndexBuilder::new, IndexBuilder::merge);

    let index = merged.freeze();
    info!(
        "Rating index built: {} items, {} users, {} ratings",
        index.n_items(),
        index.n_users(),
        index.n_ratings()
    );
    index
}

impl ItemRatingIndex {
    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_ratings(&self) -> usize {
        self.by_item.nnz()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Ratings offered to the builder, including skipped ones.
    pub fn ratings_seen(&self) -> usize {
        self.seen
    }

    pub fn ratings_skipped(&self) -> usize {
        self.skipped
    }

    /// Indexed items in ascending id order.
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    pub fn contains_item(&self, item: ItemId) -> bool {
        self.position(item).is_some()
    }

    /// Row of `item` in the CSR matrix.
    pub fn position(&self, item: ItemId) -> Option<usize> {
        self.item_ids.binary_search(&item).ok()
    }

    pub fn item_at(&self, pos: usize) -> ItemId {
        self.item_ids[pos]
    }

    /// Dense user columns and scores of the item at `pos`, columns ascending.
    pub fn row(&self, pos: usize) -> (&[usize], &[f64]) {
        let range = self.by_item.indptr().outer_inds_sz(pos);
        (
            &self.by_item.indices()[range.clone()],
            &self.by_item.data()[range],
        )
    }

    /// Item rows rated by the user at column `col`, ascending.
    pub fn items_of_user(&self, col: usize) -> &[usize] {
        let range = self.by_user.indptr().outer_inds_sz(col);
        &self.by_user.indices()[range]
    }

    /// `(user, score)` pairs of one item, ascending by user id. Empty if not indexed.
    pub fn item_ratings(&self, item: ItemId) -> Vec<(UserId, f64)> {
        match self.position(item) {
            Some(pos) => {
                let (cols, scores) = self.row(pos);
                cols.iter()
                    .zip(scores)
                    .map(|(&c, &s)| (self.user_ids[c], s))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    pub fn score(&self, item: ItemId, user: UserId) -> Option<f64> {
        let pos = self.position(item)?;
        let col = self.user_ids.binary_search(&user).ok()?;
        let (cols, scores) = self.row(pos);
        cols.binary_search(&col).ok().map(|k| scores[k])
    }

    /// Rows `j > pos` sharing at least one user with the item at `pos`, ascending.
    pub fn co_rated_after(&self, pos: usize) -> Vec<usize> {
        let (cols, _) = self.row(pos);
        let mut candidates = Vec::new();
        for &col in cols {
            let items = self.items_of_user(col);
            let start = items.partition_point(|&j| j <= pos);
            candidates.extend_from_slice(&items[start..]);
        }
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }
}
