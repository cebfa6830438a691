use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::models::{ItemId, UserId};

use super::matrix::Cell;
use super::{CancelToken, RatingMatrix, RecommendError, RecommendResult};

/// Correlation between a subject and another user or item
///
/// `correlation` is `None` when it is undefined: fewer than two jointly rated positions, or one
/// of the paired vectors is constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationPair<Id> {
    pub subject: Id,
    pub other: Id,
    pub correlation: Option<f64>,
}

/// Pearson correlation of two sparse vectors over the positions both have a value for
pub fn pearson(x: &[Cell], y: &[Cell]) -> Option<f64> {
    let paired = paired_values(x, y);
    if paired.len() < 2 {
        return None;
    }

    let (first_x, first_y) = paired[0];
    if paired.iter().all(|(a, _)| *a == first_x) || paired.iter().all(|(_, b)| *b == first_y) {
        return None;
    }

    let n = paired.len() as f64;
    let mean_x = paired.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = paired.iter().map(|(_, b)| b).sum::<f64>() / n;

    let (covariance, var_x, var_y) =
        paired
            .iter()
            .fold((0.0, 0.0, 0.0), |(cov, vx, vy), (a, b)| {
                let dx = a - mean_x;
                let dy = b - mean_y;
                (cov + dx * dy, vx + dx * dx, vy + dy * dy)
            });

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    let r = covariance / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Merge-joins two position-sorted vectors into their jointly observed values
fn paired_values(x: &[Cell], y: &[Cell]) -> Vec<(f64, f64)> {
    let mut paired = Vec::with_capacity(x.len().min(y.len()));
    let (mut i, mut j) = (0, 0);
    while i < x.len() && j < y.len() {
        match x[i].0.cmp(&y[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                paired.push((x[i].1, y[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    paired
}

/// Pairwise user correlations, keyed by ordered (a, b)
///
/// Both orientations of every pair are present and hold the same value.
#[derive(Debug, Clone, Default)]
pub struct CorrelationTable {
    pairs: HashMap<(UserId, UserId), Option<f64>>,
}

impl CorrelationTable {
    /// Defined correlation of `a` with `b`
    pub fn get(&self, a: UserId, b: UserId) -> Option<f64> {
        self.pairs.get(&(a, b)).copied().flatten()
    }

    pub fn contains(&self, a: UserId, b: UserId) -> bool {
        self.pairs.contains_key(&(a, b))
    }

    /// Number of ordered pairs, both orientations counted
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Pairs whose subject is `user`, undefined ones included
    pub fn row(&self, user: UserId) -> Vec<CorrelationPair<UserId>> {
        let mut pairs: Vec<CorrelationPair<UserId>> = self
            .pairs
            .iter()
            .filter(|((a, _), _)| *a == user)
            .map(|((a, b), correlation)| CorrelationPair {
                subject: *a,
                other: *b,
                correlation: *correlation,
            })
            .collect();
        pairs.sort_by_key(|p| p.other);
        pairs
    }
}

/// Correlation between every pair of users in `subset`, self-pairs included
pub fn user_correlation(
    matrix: &RatingMatrix,
    subset: &BTreeSet<UserId>,
    cancel: &CancelToken,
) -> RecommendResult<CorrelationTable> {
    let rows: Vec<(UserId, usize)> = subset
        .iter()
        .map(|user| {
            matrix
                .user_position(*user)
                .map(|row| (*user, row))
                .ok_or(RecommendError::UnknownUser(*user))
        })
        .collect::<RecommendResult<_>>()?;

    // Upper triangle in parallel, one task per subject row
    let triangle: Vec<Vec<((UserId, UserId), Option<f64>)>> = rows
        .par_iter()
        .enumerate()
        .map(|(i, (a, row_a))| -> RecommendResult<Vec<_>> {
            cancel.check()?;
            let x = matrix.row_at(*row_a);
            Ok(rows[i..]
                .iter()
                .map(|(b, row_b)| ((*a, *b), pearson(x, matrix.row_at(*row_b))))
                .collect())
        })
        .collect::<RecommendResult<_>>()?;

    let mut pairs = HashMap::with_capacity(rows.len() * rows.len());
    for ((a, b), correlation) in triangle.into_iter().flatten() {
        pairs.insert((a, b), correlation);
        pairs.insert((b, a), correlation);
    }

    let table = CorrelationTable { pairs };
    tracing::debug!(
        users = rows.len(),
        pairs = table.pair_count(),
        "User correlation table computed"
    );

    Ok(table)
}

/// Correlation of `target` with each of `candidates`, in candidate order
pub fn target_correlations(
    matrix: &RatingMatrix,
    target: UserId,
    candidates: &BTreeSet<UserId>,
    cancel: &CancelToken,
) -> RecommendResult<Vec<CorrelationPair<UserId>>> {
    let x = matrix
        .row(target)
        .ok_or(RecommendError::UnknownUser(target))?;

    let candidates: Vec<UserId> = candidates.iter().copied().collect();
    candidates
        .par_iter()
        .map(|other| -> RecommendResult<CorrelationPair<UserId>> {
            cancel.check()?;
            let y = matrix
                .row(*other)
                .ok_or(RecommendError::UnknownUser(*other))?;
            Ok(CorrelationPair {
                subject: target,
                other: *other,
                correlation: pearson(x, y),
            })
        })
        .collect()
}

/// Correlation of the seed item's column with every column, the seed included
pub fn item_correlation(
    matrix: &RatingMatrix,
    seed: ItemId,
    cancel: &CancelToken,
) -> RecommendResult<Vec<CorrelationPair<ItemId>>> {
    let x = matrix
        .column(seed)
        .ok_or(RecommendError::UnknownItem(seed))?;

    matrix
        .items()
        .par_iter()
        .enumerate()
        .map(|(col, other)| -> RecommendResult<CorrelationPair<ItemId>> {
            cancel.check()?;
            Ok(CorrelationPair {
                subject: seed,
                other: *other,
                correlation: pearson(x, matrix.column_at(col)),
            })
        })
        .collect()
}
