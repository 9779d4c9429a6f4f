mod test_properties;
mod test_similarity;

use crate::config::KnnConfig;

/// Sequential configuration so tests exercise the single-threaded paths too.
pub fn sequential_config() -> KnnConfig {
    KnnConfig {
        parallel: false,
        ..KnnConfig::default()
    }
}
