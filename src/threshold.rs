//! Threshold policies for neighbour retention.
//
//! API:
//! - `ThresholdPolicy`: policy enum, default `Fixed(0.75)`
//! - `ThresholdPolicy::select_threshold(&[f64]) -> f64`: resolves the cutoff against the
//!   similarities emitted by the similarity pass
//!
//! Notes:
//! - `Fixed` ignores the distribution entirely.
//! - The dynamic policies (`Mean`, `Median`, `Percentile`) read only finite values; with no
//!   finite similarity to read they fall back to `DEFAULT_THRESHOLD`.
//! - A neighbour is kept when `similarity >= threshold`.
use serde::{Deserialize, Serialize};

use log::{debug, trace};

use crate::core::SimilarityPair;
use crate::error::{KnnError, KnnResult};

pub const DEFAULT_THRESHOLD: f64 = 0.75;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum ThresholdPolicy {
    Fixed(f64),
    Mean,
    Median,
    /// Quantile in `[0, 1]` of the emitted similarities.
    Percentile(f64),
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Fixed(DEFAULT_THRESHOLD)
    }
}

impl ThresholdPolicy {
    pub fn validate(&self) -> KnnResult<()> {
        match *self {
            ThresholdPolicy::Fixed(t) if !t.is_finite() => Err(KnnError::InvalidConfig(
                format!("fixed threshold must be finite, got {t}"),
            )),
            ThresholdPolicy::Percentile(p) if !(0.0..=1.0).contains(&p) => {
                Err(KnnError::InvalidConfig(format!(
                    "percentile must lie in [0, 1], got {p}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// True when the cutoff does not depend on the data.
    pub fn is_fixed(&self) -> bool {
        matches!(self, ThresholdPolicy::Fixed(_))
    }

    pub fn select_threshold(&self, similarities: &[f64]) -> f64 {
        if let ThresholdPolicy::Fixed(t) = *self {
            return t;
        }

        let mut v: Vec<f64> = similarities
            .iter()
            .copied()
            .filter(|x| x.is_finite())
            .collect();
        if v.is_empty() {
            debug!(
                "No finite similarity to resolve {:?}; using {}",
                self, DEFAULT_THRESHOLD
            );
            return DEFAULT_THRESHOLD;
        }

        let t = match *self {
            ThresholdPolicy::Mean => v.iter().sum::<f64>() / v.len() as f64,
            ThresholdPolicy::Median | ThresholdPolicy::Percentile(_) => {
                v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                if let ThresholdPolicy::Percentile(p) = *self {
                    let pp = p.clamp(0.0, 1.0);
                    let idx = ((v.len() - 1) as f64 * pp).round() as usize;
                    v[idx]
                } else if v.len() % 2 == 1 {
                    v[v.len() / 2]
                } else {
                    let hi = v.len() / 2;
                    0.5 * (v[hi - 1] + v[hi])
                }
            }
            ThresholdPolicy::Fixed(t) => t,
        };
        trace!("Resolved {:?} over {} similarities to {}", self, v.len(), t);
        t
    }

    /// Resolves the cutoff against the scores of `pairs`.
    pub fn resolve(&self, pairs: &[SimilarityPair]) -> f64 {
        if self.is_fixed() {
            return self.select_threshold(&[]);
        }
        let scores: Vec<f64> = pairs.iter().map(|p| p.score).collect();
        self.select_threshold(&scores)
    }
}

impl std::fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdPolicy::Fixed(t) => write!(f, "Fixed({t})"),
            ThresholdPolicy::Mean => write!(f, "Mean"),
            ThresholdPolicy::Median => write!(f, "Median"),
            ThresholdPolicy::Percentile(p) => write!(f, "Percentile({p})"),
        }
    }
}
