use serde::{Deserialize, Serialize};

use crate::services::RecommendError;

pub const DEFAULT_POPULARITY_FLOOR: usize = 1000;
pub const DEFAULT_COVERAGE_RATIO: f64 = 0.60;
pub const DEFAULT_CORR_THRESHOLD: f64 = 0.65;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 3.5;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_SEED_RATING: f64 = 5.0;

/// Tuning knobs for user-based recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserParams {
    /// Fraction of the target's watched items a neighbor must also have rated
    pub coverage_ratio: f64,
    /// Minimum correlation for a neighbor to contribute
    pub corr_threshold: f64,
    /// Weighted score an item must exceed to be recommended
    pub score_threshold: f64,
    pub top_n: usize,
    /// Drop items the target already rated
    pub exclude_watched: bool,
}

impl Default for UserParams {
    fn default() -> Self {
        Self {
            coverage_ratio: DEFAULT_COVERAGE_RATIO,
            corr_threshold: DEFAULT_CORR_THRESHOLD,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            top_n: DEFAULT_TOP_N,
            exclude_watched: false,
        }
    }
}

impl UserParams {
    pub fn validate(&self) -> Result<(), RecommendError> {
        if !self.coverage_ratio.is_finite() || !(0.0..=1.0).contains(&self.coverage_ratio) {
            return Err(RecommendError::InvalidParameter(format!(
                "coverage_ratio must be within [0, 1], got {}",
                self.coverage_ratio
            )));
        }
        if !self.corr_threshold.is_finite() {
            return Err(RecommendError::InvalidParameter(
                "corr_threshold must be finite".to_string(),
            ));
        }
        if !self.score_threshold.is_finite() {
            return Err(RecommendError::InvalidParameter(
                "score_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tuning knobs for item-based recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParams {
    pub top_n: usize,
    /// Leave the seed item out of its own neighbor list
    pub exclude_self: bool,
}

impl Default for ItemParams {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            exclude_self: true,
        }
    }
}

/// Parameters of the combined user + item recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridParams {
    pub user: UserParams,
    pub item: ItemParams,
    /// Rating value whose most recent occurrence seeds the item-based half
    pub seed_rating: f64,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            user: UserParams::default(),
            item: ItemParams::default(),
            seed_rating: DEFAULT_SEED_RATING,
        }
    }
}
