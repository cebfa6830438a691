use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Catalog, CatalogEntry, HybridParams, ItemId, ItemParams, RatingRecord, UserId, UserParams,
};

use super::item_based::{most_recent_top_rated_item, similar_items_scored, SimilarItem};
use super::recommendations::{recommend_scored, WeightedScore};
use super::{CancelToken, RatingMatrix, RecommendError, RecommendResult};

/// Every raw rating grouped by user, popularity filter not applied
#[derive(Debug, Clone, Default)]
pub struct RatingIndex {
    by_user: HashMap<UserId, Vec<RatingRecord>>,
    total: usize,
}

impl RatingIndex {
    pub fn new(records: &[RatingRecord]) -> Self {
        let mut by_user: HashMap<UserId, Vec<RatingRecord>> = HashMap::new();
        for record in records {
            by_user
                .entry(record.user_id)
                .or_default()
                .push(record.clone());
        }
        Self {
            by_user,
            total: records.len(),
        }
    }

    pub fn user_records(&self, user: UserId) -> &[RatingRecord] {
        self.by_user.get(&user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_user(&self, user: UserId) -> bool {
        self.by_user.contains_key(&user)
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Summary of a snapshot for the dataset endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStats {
    pub snapshot_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub popularity_floor: usize,
    pub users: usize,
    pub items: usize,
    pub matrix_ratings: usize,
    pub ratings: usize,
    pub catalog_size: usize,
}

/// User-based and item-based lists for one user
#[derive(Debug, Clone, Serialize)]
pub struct HybridRecommendation {
    pub user_based: Vec<WeightedScore>,
    pub seed_item: ItemId,
    pub item_based: Vec<SimilarItem>,
}

/// Immutable bundle the engine answers requests from
///
/// A new dataset produces a new snapshot; an existing one is never modified, so requests
/// that started against it keep a consistent view.
#[derive(Debug)]
pub struct DatasetSnapshot {
    id: Uuid,
    built_at: DateTime<Utc>,
    popularity_floor: usize,
    matrix: RatingMatrix,
    ratings: RatingIndex,
    catalog: Catalog,
}

impl DatasetSnapshot {
    pub fn build(
        records: &[RatingRecord],
        catalog: Vec<CatalogEntry>,
        popularity_floor: usize,
    ) -> RecommendResult<Self> {
        let matrix = RatingMatrix::build(records, popularity_floor)?;
        let snapshot = Self {
            id: Uuid::new_v4(),
            built_at: Utc::now(),
            popularity_floor,
            matrix,
            ratings: RatingIndex::new(records),
            catalog: Catalog::new(catalog),
        };

        tracing::info!(
            snapshot_id = %snapshot.id,
            users = snapshot.matrix.user_count(),
            items = snapshot.matrix.item_count(),
            ratings = records.len(),
            popularity_floor,
            "Dataset snapshot built"
        );
        if snapshot.catalog.is_empty() {
            tracing::warn!(snapshot_id = %snapshot.id, "Catalog is empty, items will have no titles");
        }

        Ok(snapshot)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }

    pub fn ratings(&self) -> &RatingIndex {
        &self.ratings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            snapshot_id: self.id,
            built_at: self.built_at,
            popularity_floor: self.popularity_floor,
            users: self.matrix.user_count(),
            items: self.matrix.item_count(),
            matrix_ratings: self.matrix.rating_count(),
            ratings: self.ratings.len(),
            catalog_size: self.catalog.len(),
        }
    }

    /// Items liked by users whose taste correlates with `user`
    pub fn recommend_for_user(
        &self,
        user: UserId,
        params: &UserParams,
        cancel: &CancelToken,
    ) -> RecommendResult<Vec<WeightedScore>> {
        recommend_scored(&self.matrix, &self.ratings, user, params, cancel)
    }

    /// Items whose ratings move together with `seed`'s
    pub fn recommend_for_item(
        &self,
        seed: ItemId,
        params: &ItemParams,
        cancel: &CancelToken,
    ) -> RecommendResult<Vec<SimilarItem>> {
        similar_items_scored(&self.matrix, seed, params, cancel)
    }

    /// User-based list plus items similar to the user's latest `seed_rating` rating
    ///
    /// Fails with `IneligibleSeed` when that rating is on an item below the popularity floor.
    pub fn recommend_hybrid(
        &self,
        user: UserId,
        params: &HybridParams,
        cancel: &CancelToken,
    ) -> RecommendResult<HybridRecommendation> {
        let user_based = self.recommend_for_user(user, &params.user, cancel)?;
        let seed_item = most_recent_top_rated_item(
            self.ratings.user_records(user),
            user,
            params.seed_rating,
        )?;
        if !self.matrix.contains_item(seed_item) {
            return Err(RecommendError::IneligibleSeed {
                user,
                item: seed_item,
            });
        }
        let item_based = self.recommend_for_item(seed_item, &params.item, cancel)?;

        Ok(HybridRecommendation {
            user_based,
            seed_item,
            item_based,
        })
    }
}
