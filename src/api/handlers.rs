use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{Catalog, HybridParams, ItemId, ItemParams, UserId, UserParams},
    services::{
        item_based::SimilarItem, recommendations::WeightedScore, CancelToken, RecommendResult,
        SnapshotStats,
    },
};

use super::AppState;

// Request/Response types

/// Optional overrides of the user-based defaults
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub coverage_ratio: Option<f64>,
    pub corr_threshold: Option<f64>,
    pub score_threshold: Option<f64>,
    pub top_n: Option<usize>,
    pub exclude_watched: Option<bool>,
}

impl UserQuery {
    fn apply(&self, defaults: UserParams) -> UserParams {
        UserParams {
            coverage_ratio: self.coverage_ratio.unwrap_or(defaults.coverage_ratio),
            corr_threshold: self.corr_threshold.unwrap_or(defaults.corr_threshold),
            score_threshold: self.score_threshold.unwrap_or(defaults.score_threshold),
            top_n: self.top_n.unwrap_or(defaults.top_n),
            exclude_watched: self.exclude_watched.unwrap_or(defaults.exclude_watched),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub top_n: Option<usize>,
    pub include_self: Option<bool>,
}

impl ItemQuery {
    fn apply(&self, defaults: ItemParams) -> ItemParams {
        ItemParams {
            top_n: self.top_n.unwrap_or(defaults.top_n),
            exclude_self: self
                .include_self
                .map(|include| !include)
                .unwrap_or(defaults.exclude_self),
        }
    }
}

/// Hybrid overrides; `top_n` applies to both halves
#[derive(Debug, Default, Deserialize)]
pub struct HybridQuery {
    pub coverage_ratio: Option<f64>,
    pub corr_threshold: Option<f64>,
    pub score_threshold: Option<f64>,
    pub top_n: Option<usize>,
    pub exclude_watched: Option<bool>,
    pub seed_rating: Option<f64>,
}

impl HybridQuery {
    fn apply(&self, defaults: HybridParams) -> HybridParams {
        let user = UserQuery {
            coverage_ratio: self.coverage_ratio,
            corr_threshold: self.corr_threshold,
            score_threshold: self.score_threshold,
            top_n: self.top_n,
            exclude_watched: self.exclude_watched,
        };
        let item = ItemQuery {
            top_n: self.top_n,
            include_self: None,
        };
        HybridParams {
            user: user.apply(defaults.user),
            item: item.apply(defaults.item),
            seed_rating: self.seed_rating.unwrap_or(defaults.seed_rating),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReloadRequest {
    pub popularity_floor: Option<usize>,
}

impl ReloadRequest {
    /// An empty body keeps the current floor; anything else must parse
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid reload request: {}", e)))
    }
}

/// A recommended item with its catalog metadata
#[derive(Debug, Serialize)]
pub struct RecommendedItem {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub genres: Vec<String>,
    /// Weighted score (user-based) or correlation with the seed (item-based)
    pub score: f64,
}

impl RecommendedItem {
    fn new(catalog: &Catalog, item_id: ItemId, score: f64) -> Self {
        let entry = catalog.get(item_id);
        Self {
            item_id,
            title: entry.map(|e| e.title.clone()),
            genres: entry
                .map(|e| e.genres.iter().cloned().collect())
                .unwrap_or_default(),
            score,
        }
    }

    fn from_scores(catalog: &Catalog, scores: &[WeightedScore]) -> Vec<Self> {
        scores
            .iter()
            .map(|s| Self::new(catalog, s.item_id, s.score))
            .collect()
    }

    fn from_similar(catalog: &Catalog, similar: &[SimilarItem]) -> Vec<Self> {
        similar
            .iter()
            .map(|s| Self::new(catalog, s.item_id, s.correlation))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct UserRecommendationResponse {
    pub user_id: UserId,
    pub snapshot_id: Uuid,
    pub items: Vec<RecommendedItem>,
}

#[derive(Debug, Serialize)]
pub struct SimilarItemsResponse {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub snapshot_id: Uuid,
    pub items: Vec<RecommendedItem>,
}

#[derive(Debug, Serialize)]
pub struct HybridResponse {
    pub user_id: UserId,
    pub snapshot_id: Uuid,
    pub seed_item: ItemId,
    pub seed_title: Option<String>,
    pub user_based: Vec<RecommendedItem>,
    pub item_based: Vec<RecommendedItem>,
}

/// Runs an engine computation off the async workers
///
/// The computation is cancelled if the request is dropped before it finishes.
async fn run_blocking<T, F>(compute: F) -> AppResult<T>
where
    F: FnOnce(&CancelToken) -> RecommendResult<T> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancelToken::new();
    let guard = cancel.drop_guard();
    let result = tokio::task::spawn_blocking(move || compute(&cancel)).await?;
    guard.disarm();
    Ok(result?)
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Statistics of the snapshot currently served
pub async fn dataset_stats(State(state): State<AppState>) -> Json<SnapshotStats> {
    Json(state.snapshot().await.stats())
}

/// Rebuild the snapshot from the dataset source
///
/// An empty body keeps the current popularity floor; a malformed one is rejected with 400.
pub async fn reload_dataset(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> AppResult<Json<SnapshotStats>> {
    let popularity_floor = ReloadRequest::from_body(&body)?.popularity_floor;
    tracing::info!(%request_id, ?popularity_floor, "Reloading dataset");
    let stats = state.reload(popularity_floor).await?;
    Ok(Json(stats))
}

/// User-based recommendations
pub async fn user_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<u32>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserRecommendationResponse>> {
    let user_id = UserId(user_id);
    let params = query.apply(state.defaults.user);
    let snapshot = state.snapshot().await;

    tracing::info!(%request_id, %user_id, ?params, "User-based recommendation requested");

    let engine = snapshot.clone();
    let scores =
        run_blocking(move |cancel| engine.recommend_for_user(user_id, &params, cancel)).await?;

    Ok(Json(UserRecommendationResponse {
        user_id,
        snapshot_id: snapshot.id(),
        items: RecommendedItem::from_scores(snapshot.catalog(), &scores),
    }))
}

/// Item-based recommendations for one seed item
pub async fn similar_items(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(item_id): Path<u32>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<SimilarItemsResponse>> {
    let item_id = ItemId(item_id);
    let params = query.apply(state.defaults.item);
    let snapshot = state.snapshot().await;

    tracing::info!(%request_id, %item_id, ?params, "Item-based recommendation requested");

    let engine = snapshot.clone();
    let similar =
        run_blocking(move |cancel| engine.recommend_for_item(item_id, &params, cancel)).await?;

    let catalog = snapshot.catalog();
    Ok(Json(SimilarItemsResponse {
        item_id,
        title: catalog.title(item_id).map(str::to_string),
        snapshot_id: snapshot.id(),
        items: RecommendedItem::from_similar(catalog, &similar),
    }))
}

/// User-based list plus items similar to the user's latest top rating
///
/// Answers 422 when that rating is on an item below the popularity floor.
pub async fn hybrid_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<u32>,
    Query(query): Query<HybridQuery>,
) -> AppResult<Json<HybridResponse>> {
    let user_id = UserId(user_id);
    let params = query.apply(state.defaults.hybrid);
    let snapshot = state.snapshot().await;

    tracing::info!(%request_id, %user_id, ?params, "Hybrid recommendation requested");

    let engine = snapshot.clone();
    let hybrid =
        run_blocking(move |cancel| engine.recommend_hybrid(user_id, &params, cancel)).await?;

    let catalog = snapshot.catalog();
    Ok(Json(HybridResponse {
        user_id,
        snapshot_id: snapshot.id(),
        seed_item: hybrid.seed_item,
        seed_title: catalog.title(hybrid.seed_item).map(str::to_string),
        user_based: RecommendedItem::from_scores(catalog, &hybrid.user_based),
        item_based: RecommendedItem::from_similar(catalog, &hybrid.item_based),
    }))
}
