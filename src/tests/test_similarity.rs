use approx::assert_relative_eq;

use crate::core::Rating;
use crate::error::KnnError;
use crate::index::build_index;
use crate::similarity::{
    compute_similarities, compute_similarities_with, pearson, Correlation, SimilarityParams,
    Undefined,
};
use crate::tests::test_helpers::{random_ratings, three_user_pair, three_user_pair_pearson};

fn seq_params() -> SimilarityParams {
    SimilarityParams {
        parallel: false,
        ..SimilarityParams::default()
    }
}

#[test]
fn test_three_user_pair_positive() {
    let index = build_index(three_user_pair());
    let pairs = compute_similarities(&index).unwrap();

    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].item_a, pairs[0].item_b), (10, 20));
    assert_relative_eq!(pairs[0].score, three_user_pair_pearson(), epsilon = 1e-12);
    assert!(pairs[0].score > 0.65 && pairs[0].score < 0.66);
}

#[test]
fn test_pearson_single_pair_entry_point() {
    let index = build_index(three_user_pair());
    let r = pearson(&index, 20, 10, 2);
    assert_relative_eq!(r.value().unwrap(), three_user_pair_pearson(), epsilon = 1e-12);
    assert_eq!(
        pearson(&index, 10, 99, 2),
        Correlation::Undefined(Undefined::NoOverlap)
    );
}

#[test]
fn test_disjoint_items_emit_nothing() {
    // item 3 only rated by user 4, item 4 only by user 5
    let ratings = vec![Rating::new(4, 3, 5.0), Rating::new(5, 4, 2.0)];
    let index = build_index(ratings);

    assert_eq!(
        pearson(&index, 3, 4, 2),
        Correlation::Undefined(Undefined::NoOverlap)
    );
    let (pairs, stats) = compute_similarities_with(&index, &seq_params()).unwrap();
    assert!(pairs.is_empty());
    // never even considered as a candidate
    assert_eq!(stats.candidates, 0);
}

#[test]
fn test_single_co_rating_emits_nothing() {
    let ratings = vec![
        Rating::new(1, 1, 5.0),
        Rating::new(1, 2, 5.0),
        Rating::new(2, 1, 1.0),
        Rating::new(3, 2, 2.0),
    ];
    let index = build_index(ratings);
    assert_eq!(
        pearson(&index, 1, 2, 2),
        Correlation::Undefined(Undefined::TooFewCoRatings(1))
    );
    let (pairs, stats) = compute_similarities_with(&index, &seq_params()).unwrap();
    assert!(pairs.is_empty());
    assert_eq!(stats.candidates, 1);
    assert_eq!(stats.undefined, 1);
}

#[test]
fn test_zero_variance_emits_nothing() {
    // item 1 gets the same score from everyone
    let ratings = vec![
        Rating::new(1, 1, 3.0),
        Rating::new(1, 2, 1.0),
        Rating::new(2, 1, 3.0),
        Rating::new(2, 2, 4.0),
        Rating::new(3, 1, 3.0),
        Rating::new(3, 2, 5.0),
    ];
    let index = build_index(ratings);
    assert_eq!(
        pearson(&index, 1, 2, 2),
        Correlation::Undefined(Undefined::ZeroVariance)
    );
    assert!(compute_similarities(&index).unwrap().is_empty());
}

#[test]
fn test_constant_decimal_items_emit_nothing() {
    // both items rated 0.1 by every user; item 3 is constant at 0.7
    let mut ratings = Vec::new();
    for user in 1..=3 {
        ratings.push(Rating::new(user, 1, 0.1));
        ratings.push(Rating::new(user, 2, 0.1));
        ratings.push(Rating::new(user, 3, 0.7));
    }
    let index = build_index(ratings);

    assert_eq!(
        pearson(&index, 1, 2, 2),
        Correlation::Undefined(Undefined::ZeroVariance)
    );
    assert_eq!(
        pearson(&index, 2, 3, 2),
        Correlation::Undefined(Undefined::ZeroVariance)
    );
    for parallel in [false, true] {
        let params = SimilarityParams {
            parallel,
            ..SimilarityParams::default()
        };
        let (pairs, stats) = compute_similarities_with(&index, &params).unwrap();
        assert!(pairs.is_empty(), "{pairs:?}");
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.undefined, 3);
    }
}

#[test]
fn test_negative_correlation_dropped() {
    let ratings = vec![
        Rating::new(1, 1, 1.0),
        Rating::new(1, 2, 5.0),
        Rating::new(2, 1, 3.0),
        Rating::new(2, 2, 3.0),
        Rating::new(3, 1, 5.0),
        Rating::new(3, 2, 1.0),
    ];
    let index = build_index(ratings);
    assert_relative_eq!(pearson(&index, 1, 2, 2).value().unwrap(), -1.0, epsilon = 1e-12);

    let (pairs, stats) = compute_similarities_with(&index, &seq_params()).unwrap();
    assert!(pairs.is_empty());
    assert_eq!(stats.non_positive, 1);
}

#[test]
fn test_only_co_rated_users_count() {
    // user 9 rated only item 1 with an outlier; it must not shift item 1's mean
    let mut ratings = three_user_pair();
    ratings.push(Rating::new(9, 10, 1.0));
    let index = build_index(ratings);
    assert_relative_eq!(
        pearson(&index, 10, 20, 2).value().unwrap(),
        three_user_pair_pearson(),
        epsilon = 1e-12
    );
}

#[test]
fn test_min_co_ratings_raises_the_bar() {
    let index = build_index(three_user_pair());
    let params = SimilarityParams {
        min_co_ratings: 4,
        ..seq_params()
    };
    let (pairs, stats) = compute_similarities_with(&index, &params).unwrap();
    assert!(pairs.is_empty());
    assert_eq!(stats.undefined, 1);
}

#[test]
fn test_capacity_exceeded() {
    let index = build_index(random_ratings(1, 20, 30, 0.5));
    let params = SimilarityParams {
        max_items: Some(5),
        ..SimilarityParams::default()
    };
    match compute_similarities_with(&index, &params) {
        Err(KnnError::CapacityExceeded { items, limit }) => {
            assert_eq!(items, index.n_items());
            assert_eq!(limit, 5);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

#[test]
fn test_output_sorted_and_canonical() {
    let index = build_index(random_ratings(11, 80, 40, 0.3));
    let pairs = compute_similarities(&index).unwrap();
    assert!(!pairs.is_empty());
    for p in &pairs {
        assert!(p.item_a < p.item_b);
        assert!(p.score > 0.0 && p.score <= 1.0 + 1e-9);
    }
    for w in pairs.windows(2) {
        assert!((w[0].item_a, w[0].item_b) < (w[1].item_a, w[1].item_b));
    }
}

#[test]
fn test_matches_brute_force_over_all_pairs() {
    let index = build_index(random_ratings(5, 50, 25, 0.35));
    let (pairs, _) = compute_similarities_with(&index, &seq_params()).unwrap();

    let ids = index.item_ids().to_vec();
    let mut expected = Vec::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if let Correlation::Defined(r) = pearson(&index, a, b, 2) {
                if r > 0.0 {
                    expected.push((a, b, r));
                }
            }
        }
    }

    assert_eq!(pairs.len(), expected.len());
    for (p, (a, b, r)) in pairs.iter().zip(expected) {
        assert_eq!((p.item_a, p.item_b), (a, b));
        assert_relative_eq!(p.score, r, epsilon = 1e-12);
    }
}
