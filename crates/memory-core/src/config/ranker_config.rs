use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Weights for the recall ranker's weighted sum of sub-scores. Must sum
/// to 1.0 and be non-negative; `validate` falls back to `default()` with
/// a `tracing::warn!` when a loaded config fails that check, per the
/// ranker's documented behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub weight_similarity: f64,
    pub weight_recency: f64,
    pub weight_frequency: f64,
    pub weight_type_boost: f64,
    pub weight_scope_boost: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            weight_similarity: DEFAULT_WEIGHT_SIMILARITY,
            weight_recency: DEFAULT_WEIGHT_RECENCY,
            weight_frequency: DEFAULT_WEIGHT_FREQUENCY,
            weight_type_boost: DEFAULT_WEIGHT_TYPE_BOOST,
            weight_scope_boost: DEFAULT_WEIGHT_SCOPE_BOOST,
        }
    }
}

impl RankerConfig {
    /// Weights must be non-negative and sum to 1.0 (within a small
    /// float tolerance).
    pub fn is_valid(&self) -> bool {
        let weights = [
            self.weight_similarity,
            self.weight_recency,
            self.weight_frequency,
            self.weight_type_boost,
            self.weight_scope_boost,
        ];
        if weights.iter().any(|w| *w < 0.0) {
            return false;
        }
        (weights.iter().sum::<f64>() - 1.0).abs() < 1e-6
    }

    /// Returns `self` if valid, otherwise logs a warning and returns the
    /// default weight set.
    pub fn validated(self) -> Self {
        if self.is_valid() {
            self
        } else {
            tracing::warn!(
                similarity = self.weight_similarity,
                recency = self.weight_recency,
                frequency = self.weight_frequency,
                type_boost = self.weight_type_boost,
                scope_boost = self.weight_scope_boost,
                "ranker weights invalid (must be non-negative and sum to 1.0), falling back to defaults"
            );
            Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_are_valid() {
        assert!(RankerConfig::default().is_valid());
    }

    #[test]
    fn weights_not_summing_to_one_fall_back_to_defaults() {
        let bad = RankerConfig {
            weight_similarity: 0.9,
            weight_recency: 0.9,
            weight_frequency: 0.0,
            weight_type_boost: 0.0,
            weight_scope_boost: 0.0,
        };
        assert!(!bad.is_valid());
        assert_eq!(bad.validated(), RankerConfig::default());
    }

    #[test]
    fn negative_weight_is_invalid() {
        let bad = RankerConfig {
            weight_similarity: -0.1,
            weight_recency: 0.3,
            weight_frequency: 0.3,
            weight_type_boost: 0.3,
            weight_scope_boost: 0.2,
        };
        assert!(!bad.is_valid());
    }
}
