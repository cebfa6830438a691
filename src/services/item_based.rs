use serde::Serialize;

use crate::models::{ItemId, ItemParams, RatingRecord, UserId};

use super::correlation::item_correlation;
use super::{CancelToken, RatingMatrix, RecommendError, RecommendResult};

/// An item and its correlation with the seed item
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarItem {
    pub item_id: ItemId,
    pub correlation: f64,
}

/// Items whose rating columns correlate best with the seed's, best first
///
/// Undefined correlations are dropped; ties break by ascending item id.
pub fn similar_items_scored(
    matrix: &RatingMatrix,
    seed: ItemId,
    params: &ItemParams,
    cancel: &CancelToken,
) -> RecommendResult<Vec<SimilarItem>> {
    let mut similar: Vec<SimilarItem> = item_correlation(matrix, seed, cancel)?
        .into_iter()
        .filter(|pair| !(params.exclude_self && pair.other == seed))
        .filter_map(|pair| {
            pair.correlation.map(|correlation| SimilarItem {
                item_id: pair.other,
                correlation,
            })
        })
        .collect();

    similar.sort_by(|a, b| {
        b.correlation
            .total_cmp(&a.correlation)
            .then(a.item_id.cmp(&b.item_id))
    });
    similar.truncate(params.top_n);

    tracing::debug!(
        seed = %seed,
        similar = similar.len(),
        "Item-based recommendation computed"
    );

    Ok(similar)
}

pub fn similar_items(
    matrix: &RatingMatrix,
    seed: ItemId,
    params: &ItemParams,
    cancel: &CancelToken,
) -> RecommendResult<Vec<ItemId>> {
    Ok(similar_items_scored(matrix, seed, params, cancel)?
        .into_iter()
        .map(|s| s.item_id)
        .collect())
}

/// The item `user` most recently gave exactly `rating_value`
///
/// Equal timestamps resolve to the smallest item id.
pub fn most_recent_top_rated_item(
    records: &[RatingRecord],
    user: UserId,
    rating_value: f64,
) -> RecommendResult<ItemId> {
    records
        .iter()
        .filter(|r| r.user_id == user && r.rating == rating_value)
        .max_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(b.item_id.cmp(&a.item_id))
        })
        .map(|r| r.item_id)
        .ok_or(RecommendError::NoQualifyingRating {
            user,
            rating: rating_value,
        })
}
