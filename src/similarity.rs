//! # Pairwise Pearson similarity over co-rated users
//!
//! For every unordered pair of indexed items `(A, B)` the engine restricts both
//! rating vectors to the users who rated *both* items and computes
//!
//! ```text
//!            Σ (a_u - ā)(b_u - b̄)
//! r(A,B) = ─────────────────────────────      u ∈ U = users(A) ∩ users(B)
//!          √Σ (a_u - ā)² · √Σ (b_u - b̄)²
//! ```
//!
//! with the means taken over `U` only.
//!
//! The correlation is **undefined** (and no pair is emitted) when `U` is empty, when
//! it holds fewer than `min_co_ratings` users (never fewer than two: a single
//! co-rating has no variance), or when either side has zero variance over `U`.
//! Defined correlations that are not strictly positive are dropped as well.
//!
//! ## Candidate enumeration
//!
//! Pairs without a common user can never produce a score, so they are never
//! visited: for row `i` the candidates are collected from the user-major transpose
//! (`ItemRatingIndex::co_rated_after`). Each candidate costs one linear merge of two
//! sorted user lists.
//!
//! ## Parallelism
//!
//! The outer loop over items is split across rayon workers. The index is frozen and
//! shared read-only, so no synchronisation is needed. Per-row results are
//! concatenated in row order, which keeps the output sorted by `(item_a, item_b)`.

use std::ops::AddAssign;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::core::{ItemId, SimilarityPair};
use crate::error::{KnnError, KnnResult};
use crate::index::ItemRatingIndex;

/// Fewest co-rated users a correlation can be computed from.
pub const MIN_CO_RATINGS: usize = 2;

/// Why a correlation has no value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Undefined {
    /// The two items share no user.
    NoOverlap,
    /// Fewer co-rated users than required; carries the observed count.
    TooFewCoRatings(usize),
    /// One side is constant over the co-rated users.
    ZeroVariance,
}

/// Outcome of correlating two items.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Correlation {
    Defined(f64),
    Undefined(Undefined),
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match *self {
            Correlation::Defined(r) => Some(r),
            Correlation::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Correlation::Defined(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimilarityParams {
    pub min_co_ratings: usize,
    /// Refuse to run on indices holding more items than this.
    pub max_items: Option<usize>,
    pub parallel: bool,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self {
            min_co_ratings: MIN_CO_RATINGS,
            max_items: None,
            parallel: true,
        }
    }
}

/// Counters over one similarity pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairStats {
    /// Pairs sharing at least one user.
    pub candidates: usize,
    pub undefined: usize,
    /// Defined but `<= 0`.
    pub non_positive: usize,
    pub emitted: usize,
}

impl AddAssign for PairStats {
    fn add_assign(&mut self, rhs: Self) {
        self.candidates += rhs.candidates;
        self.undefined += rhs.undefined;
        self.non_positive += rhs.non_positive;
        self.emitted += rhs.emitted;
    }
}

/// Intersects two sorted user rows into `buf` as `(score_a, score_b)` pairs.
fn co_rated(
    (a_cols, a_scores): (&[usize], &[f64]),
    (b_cols, b_scores): (&[usize], &[f64]),
    buf: &mut Vec<(f64, f64)>,
) {
    buf.clear();
    let (mut i, mut j) = (0, 0);
    while i < a_cols.len() && j < b_cols.len() {
        match a_cols[i].cmp(&b_cols[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                buf.push((a_scores[i], b_scores[j]));
                i += 1;
                j += 1;
            }
        }
    }
}

/// Pearson correlation of already-paired co-ratings.
pub fn pearson_of_pairs(pairs: &[(f64, f64)], min_co_ratings: usize) -> Correlation {
    let n = pairs.len();
    if n == 0 {
        return Correlation::Undefined(Undefined::NoOverlap);
    }
    if n < min_co_ratings.max(MIN_CO_RATINGS) {
        return Correlation::Undefined(Undefined::TooFewCoRatings(n));
    }
    // a constant side leaves rounding residue in the deviations, test it exactly
    let (first_a, first_b) = pairs[0];
    if pairs.iter().all(|&(a, _)| a == first_a) || pairs.iter().all(|&(_, b)| b == first_b) {
        return Correlation::Undefined(Undefined::ZeroVariance);
    }

    let (sum_a, sum_b) = pairs
        .iter()
        .fold((0.0, 0.0), |(sa, sb), &(a, b)| (sa + a, sb + b));
    let mean_a = sum_a / n as f64;
    let mean_b = sum_b / n as f64;

    let mut num = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for &(a, b) in pairs {
        let da = a - mean_a;
        let db = b - mean_b;
        num += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let den = var_a.sqrt() * var_b.sqrt();
    if den == 0.0 || !den.is_finite() {
        return Correlation::Undefined(Undefined::ZeroVariance);
    }
    Correlation::Defined((num / den).clamp(-1.0, 1.0))
}

/// Correlation between two items of the index.
/// An item missing from the index has no ratings and therefore no overlap.
pub fn pearson(
    index: &ItemRatingIndex,
    a: ItemId,
    b: ItemId,
    min_co_ratings: usize,
) -> Correlation {
    let (Some(pa), Some(pb)) = (index.position(a), index.position(b)) else {
        return Correlation::Undefined(Undefined::NoOverlap);
    };
    let mut buf = Vec::new();
    co_rated(index.row(pa), index.row(pb), &mut buf);
    pearson_of_pairs(&buf, min_co_ratings)
}

/// All positive, well-defined similarities of the index with default parameters.
pub fn compute_similarities(index: &ItemRatingIndex) -> KnnResult<Vec<SimilarityPair>> {
    compute_similarities_with(index, &SimilarityParams::default()).map(|(pairs, _)| pairs)
}

/// All positive, well-defined similarities of the index, sorted by `(item_a, item_b)`.
pub fn compute_similarities_with(
    index: &ItemRatingIndex,
    params: &SimilarityParams,
) -> KnnResult<(Vec<SimilarityPair>, PairStats)> {
    let n = index.n_items();
    if let Some(limit) = params.max_items {
        if n > limit {
            return Err(KnnError::CapacityExceeded { items: n, limit });
        }
    }

    info!(
        "Computing Pearson similarities over {} items ({} ratings)",
        n,
        index.n_ratings()
    );
    debug!(
        "Similarity parameters: min_co_ratings={}, max_items={:?}, parallel={}",
        params.min_co_ratings, params.max_items, params.parallel
    );

    let min_co = params.min_co_ratings.max(MIN_CO_RATINGS);
    let per_row = |i: usize| -> (Vec<SimilarityPair>, PairStats) {
        let mut stats = PairStats::default();
        let mut buf = Vec::new();
        let row_i = index.row(i);
        let item_i = index.item_at(i);

        let candidates = index.co_rated_after(i);
        stats.candidates = candidates.len();

        let mut out = Vec::new();
        for j in candidates {
            co_rated(row_i, index.row(j), &mut buf);
            match pearson_of_pairs(&buf, min_co) {
                Correlation::Defined(r) if r > 0.0 => {
                    out.push(SimilarityPair::new(item_i, index.item_at(j), r));
                }
                Correlation::Defined(_) => stats.non_positive += 1,
                Correlation::Undefined(_) => stats.undefined += 1,
            }
        }
        stats.emitted = out.len();
        trace!(
            "Item {}: {} candidates, {} pairs emitted",
            item_i,
            stats.candidates,
            stats.emitted
        );
        (out, stats)
    };

    let rows: Vec<(Vec<SimilarityPair>, PairStats)> = if params.parallel {
        (0..n).into_par_iter().map(per_row).collect()
    } else {
        (0..n).map(per_row).collect()
    };

    let mut stats = PairStats::default();
    let mut pairs = Vec::with_capacity(rows.iter().map(|(p, _)| p.len()).sum());
    for (row_pairs, row_stats) in rows {
        pairs.extend(row_pairs);
        stats += row_stats;
    }

    info!(
        "Similarity pass done: {} candidates, {} emitted, {} undefined, {} non-positive",
        stats.candidates, stats.emitted, stats.undefined, stats.non_positive
    );
    Ok((pairs, stats))
}
