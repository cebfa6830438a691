use thiserror::Error;

use crate::models::{ItemId, UserId};

pub mod cancel;
pub mod correlation;
pub mod item_based;
pub mod matrix;
pub mod neighborhood;
pub mod recommendations;
pub mod snapshot;

pub use cancel::{CancelGuard, CancelToken};
pub use matrix::RatingMatrix;
pub use snapshot::{DatasetSnapshot, HybridRecommendation, RatingIndex, SnapshotStats};

/// Failures of the recommendation engine
///
/// Empty neighborhoods and empty result lists are not errors; they come back as empty vectors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    #[error("No items have more than {floor} ratings")]
    EmptyMatrix { floor: usize },
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),
    #[error("User {0} has no ratings on eligible items")]
    NoHistory(UserId),
    #[error("User {user} has no rating of {rating}")]
    NoQualifyingRating { user: UserId, rating: f64 },
    #[error("Seed item {item} of user {user} has too few ratings to find similar items")]
    IneligibleSeed { user: UserId, item: ItemId },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Computation cancelled")]
    Cancelled,
}

pub type RecommendResult<T> = Result<T, RecommendError>;
