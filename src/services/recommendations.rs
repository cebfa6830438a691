use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{ItemId, UserId, UserParams};

use super::correlation::target_correlations;
use super::neighborhood::{candidate_neighbors, watched_items};
use super::{CancelToken, RatingIndex, RatingMatrix, RecommendError, RecommendResult};

/// A neighbor whose correlation with the target passed the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub correlation: f64,
}

/// Mean correlation-weighted rating of an item across neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedScore {
    pub item_id: ItemId,
    pub score: f64,
}

/// Neighbors of `target` correlated at or above `corr_threshold`
///
/// Sorted by correlation descending, then by ascending user id. Candidates with an undefined
/// correlation never qualify.
pub fn top_neighbors(
    matrix: &RatingMatrix,
    target: UserId,
    params: &UserParams,
    cancel: &CancelToken,
) -> RecommendResult<Vec<Neighbor>> {
    let watched = watched_items(matrix, target)?;
    if watched.is_empty() {
        return Err(RecommendError::NoHistory(target));
    }

    let candidates = candidate_neighbors(matrix, target, &watched, params.coverage_ratio);
    tracing::debug!(
        user_id = %target,
        watched = watched.len(),
        candidates = candidates.len(),
        "Neighbor candidates selected"
    );
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut neighbors: Vec<Neighbor> = target_correlations(matrix, target, &candidates, cancel)?
        .into_iter()
        .filter_map(|pair| match pair.correlation {
            Some(correlation) if correlation >= params.corr_threshold => Some(Neighbor {
                user_id: pair.other,
                correlation,
            }),
            _ => None,
        })
        .collect();

    neighbors.sort_by(|a, b| {
        b.correlation
            .total_cmp(&a.correlation)
            .then(a.user_id.cmp(&b.user_id))
    });

    Ok(neighbors)
}

/// Weighted score of every item the neighbors rated, in ascending item order
///
/// Uses the neighbors' full rating history, popular or not. The target's own ratings never
/// contribute, and items in `excluded` are skipped.
pub fn score_items(
    ratings: &RatingIndex,
    target: UserId,
    neighbors: &[Neighbor],
    excluded: &HashSet<ItemId>,
) -> Vec<WeightedScore> {
    let mut totals: BTreeMap<ItemId, (f64, u32)> = BTreeMap::new();

    for neighbor in neighbors.iter().filter(|n| n.user_id != target) {
        for record in ratings.user_records(neighbor.user_id) {
            if excluded.contains(&record.item_id) {
                continue;
            }
            let total = totals.entry(record.item_id).or_insert((0.0, 0));
            total.0 += neighbor.correlation * record.rating;
            total.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(item_id, (sum, n))| WeightedScore {
            item_id,
            score: sum / f64::from(n),
        })
        .collect()
}

/// Keeps scores above `threshold`, best first, ties by ascending item id
pub fn rank_scores(mut scores: Vec<WeightedScore>, threshold: f64, top_n: usize) -> Vec<WeightedScore> {
    scores.retain(|s| s.score > threshold);
    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.item_id.cmp(&b.item_id)));
    scores.truncate(top_n);
    scores
}

/// User-based recommendation with the scores that ranked each item
pub fn recommend_scored(
    matrix: &RatingMatrix,
    ratings: &RatingIndex,
    target: UserId,
    params: &UserParams,
    cancel: &CancelToken,
) -> RecommendResult<Vec<WeightedScore>> {
    params.validate()?;

    if !matrix.contains_user(target) {
        // Rated only items below the popularity floor
        if ratings.contains_user(target) {
            return Err(RecommendError::NoHistory(target));
        }
        return Err(RecommendError::UnknownUser(target));
    }

    let neighbors = top_neighbors(matrix, target, params, cancel)?;
    if neighbors.is_empty() {
        tracing::debug!(user_id = %target, "No neighbors passed the correlation threshold");
        return Ok(Vec::new());
    }

    let excluded: HashSet<ItemId> = if params.exclude_watched {
        ratings
            .user_records(target)
            .iter()
            .map(|r| r.item_id)
            .collect()
    } else {
        HashSet::new()
    };

    let scores = score_items(ratings, target, &neighbors, &excluded);
    let ranked = rank_scores(scores, params.score_threshold, params.top_n);

    tracing::debug!(
        user_id = %target,
        neighbors = neighbors.len(),
        recommended = ranked.len(),
        "User-based recommendation computed"
    );

    Ok(ranked)
}

/// User-based recommendation: ranked item ids
pub fn recommend(
    matrix: &RatingMatrix,
    ratings: &RatingIndex,
    target: UserId,
    params: &UserParams,
    cancel: &CancelToken,
) -> RecommendResult<Vec<ItemId>> {
    Ok(recommend_scored(matrix, ratings, target, params, cancel)?
        .into_iter()
        .map(|s| s.item_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RatingRecord;
    use chrono::Utc;

    fn records(cells: &[(u32, u32, f64)]) -> Vec<RatingRecord> {
        cells
            .iter()
            .map(|(u, i, r)| RatingRecord::new(*u, *i, *r, Utc::now()))
            .collect()
    }

    /// Users 1..=3 share items 1..=3; user 2 mirrors user 1, user 3 is inverted.
    /// Items 100 and 101 are rated once each and fall below the popularity floor.
    fn fixture() -> (RatingMatrix, RatingIndex) {
        let records = records(&[
            (1, 1, 5.0),
            (1, 2, 4.0),
            (1, 3, 1.0),
            (2, 1, 5.0),
            (2, 2, 4.5),
            (2, 3, 1.5),
            (2, 100, 4.5),
            (3, 1, 1.0),
            (3, 2, 2.0),
            (3, 3, 5.0),
            (3, 101, 5.0),
        ]);
        let matrix = RatingMatrix::build(&records, 1).unwrap();
        (matrix, RatingIndex::new(&records))
    }

    #[test]
    fn test_top_neighbors_filters_by_correlation() {
        let (matrix, _) = fixture();
        let neighbors =
            top_neighbors(&matrix, UserId(1), &UserParams::default(), &CancelToken::new())
                .unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].user_id, UserId(2));
        assert!(neighbors[0].correlation > 0.9);
    }

    #[test]
    fn test_neighbor_ties_break_by_user_id() {
        let records = records(&[
            (1, 1, 5.0),
            (1, 2, 3.0),
            (9, 1, 4.0),
            (9, 2, 2.0),
            (4, 1, 2.0),
            (4, 2, 1.0),
        ]);
        let matrix = RatingMatrix::build(&records, 0).unwrap();
        let neighbors =
            top_neighbors(&matrix, UserId(1), &UserParams::default(), &CancelToken::new())
                .unwrap();
        let ids: Vec<UserId> = neighbors.iter().map(|n| n.user_id).collect();
        assert_eq!(ids, vec![UserId(4), UserId(9)]);
    }

    #[test]
    fn test_undefined_correlation_never_qualifies() {
        // one jointly rated item leaves the correlation undefined
        let records = records(&[(1, 1, 4.0), (2, 1, 5.0), (2, 2, 3.0)]);
        let matrix = RatingMatrix::build(&records, 0).unwrap();
        let params = UserParams {
            corr_threshold: -1.0,
            ..Default::default()
        };
        let neighbors =
            top_neighbors(&matrix, UserId(1), &params, &CancelToken::new()).unwrap();
        assert!(neighbors.is_empty());
    }

    #[test]
    fn test_scores_use_unfiltered_ratings() {
        let (matrix, ratings) = fixture();
        let scored = recommend_scored(
            &matrix,
            &ratings,
            UserId(1),
            &UserParams::default(),
            &CancelToken::new(),
        )
        .unwrap();

        // user 2's rating of the unpopular item 100 still counts
        assert!(scored.iter().any(|s| s.item_id == ItemId(100)));
        // user 3 is anti-correlated, so item 101 never appears
        assert!(scored.iter().all(|s| s.item_id != ItemId(101)));
    }

    #[test]
    fn test_score_is_mean_of_weighted_ratings() {
        let ratings = RatingIndex::new(&records(&[
            (2, 7, 4.0),
            (3, 7, 5.0),
            (2, 8, 2.0),
        ]));
        let neighbors = [
            Neighbor {
                user_id: UserId(2),
                correlation: 1.0,
            },
            Neighbor {
                user_id: UserId(3),
                correlation: 0.8,
            },
        ];
        let scores = score_items(&ratings, UserId(1), &neighbors, &HashSet::new());
        assert_eq!(
            scores,
            vec![
                WeightedScore {
                    item_id: ItemId(7),
                    score: 4.0
                },
                WeightedScore {
                    item_id: ItemId(8),
                    score: 2.0
                },
            ]
        );
    }

    #[test]
    fn test_rank_scores_strict_threshold_and_ties() {
        let scores = vec![
            WeightedScore {
                item_id: ItemId(3),
                score: 4.0,
            },
            WeightedScore {
                item_id: ItemId(1),
                score: 4.0,
            },
            WeightedScore {
                item_id: ItemId(2),
                score: 3.5,
            },
            WeightedScore {
                item_id: ItemId(4),
                score: 4.5,
            },
        ];
        let ranked: Vec<ItemId> = rank_scores(scores, 3.5, 5)
            .into_iter()
            .map(|s| s.item_id)
            .collect();
        assert_eq!(ranked, vec![ItemId(4), ItemId(1), ItemId(3)]);
    }

    #[test]
    fn test_no_neighbor_passes_threshold_is_empty() {
        let (matrix, ratings) = fixture();
        let params = UserParams {
            corr_threshold: 1.01,
            ..Default::default()
        };
        let result =
            recommend(&matrix, &ratings, UserId(1), &params, &CancelToken::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_exclude_watched_drops_rated_items() {
        let (matrix, ratings) = fixture();
        let params = UserParams {
            exclude_watched: true,
            score_threshold: 0.0,
            ..Default::default()
        };
        let result =
            recommend(&matrix, &ratings, UserId(1), &params, &CancelToken::new()).unwrap();
        assert_eq!(result, vec![ItemId(100)]);
    }

    #[test]
    fn test_user_with_only_unpopular_ratings_has_no_history() {
        let records = records(&[(1, 1, 5.0), (2, 1, 4.0), (3, 50, 4.0)]);
        let matrix = RatingMatrix::build(&records, 1).unwrap();
        let ratings = RatingIndex::new(&records);

        let result = recommend(
            &matrix,
            &ratings,
            UserId(3),
            &UserParams::default(),
            &CancelToken::new(),
        );
        assert_eq!(result, Err(RecommendError::NoHistory(UserId(3))));

        let result = recommend(
            &matrix,
            &ratings,
            UserId(42),
            &UserParams::default(),
            &CancelToken::new(),
        );
        assert_eq!(result, Err(RecommendError::UnknownUser(UserId(42))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (matrix, ratings) = fixture();
        let params = UserParams {
            coverage_ratio: -0.1,
            ..Default::default()
        };
        let result = recommend(&matrix, &ratings, UserId(1), &params, &CancelToken::new());
        assert!(matches!(result, Err(RecommendError::InvalidParameter(_))));
    }
}
