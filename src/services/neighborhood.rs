use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{ItemId, UserId};

use super::{RatingMatrix, RecommendError, RecommendResult};

/// A user who rated some of the target's watched items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NeighborCandidate {
    pub user_id: UserId,
    pub overlap_count: usize,
}

/// Items the user has a rating for in the matrix
pub fn watched_items(matrix: &RatingMatrix, user: UserId) -> RecommendResult<BTreeSet<ItemId>> {
    let row = matrix
        .row(user)
        .ok_or(RecommendError::UnknownUser(user))?;
    Ok(row.iter().map(|(col, _)| matrix.items()[*col]).collect())
}

/// Users other than `target` who rated strictly more than `coverage_ratio` of `watched`
///
/// Returned in ascending user order. An empty result is a normal outcome.
pub fn neighbor_candidates(
    matrix: &RatingMatrix,
    target: UserId,
    watched: &BTreeSet<ItemId>,
    coverage_ratio: f64,
) -> Vec<NeighborCandidate> {
    let mut overlap = vec![0usize; matrix.user_count()];
    for item in watched {
        if let Some(column) = matrix.column(*item) {
            for (row, _) in column {
                overlap[*row] += 1;
            }
        }
    }

    let required = watched.len() as f64 * coverage_ratio;
    let target_row = matrix.user_position(target);

    overlap
        .into_iter()
        .enumerate()
        .filter(|(row, count)| Some(*row) != target_row && *count as f64 > required)
        .map(|(row, overlap_count)| NeighborCandidate {
            user_id: matrix.users()[row],
            overlap_count,
        })
        .collect()
}

/// Ids of [`neighbor_candidates`]
pub fn candidate_neighbors(
    matrix: &RatingMatrix,
    target: UserId,
    watched: &BTreeSet<ItemId>,
    coverage_ratio: f64,
) -> BTreeSet<UserId> {
    neighbor_candidates(matrix, target, watched, coverage_ratio)
        .into_iter()
        .map(|c| c.user_id)
        .collect()
}
