use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    loaders::{load_dataset, DatasetLoader},
    models::{HybridParams, ItemParams, UserParams},
    services::{DatasetSnapshot, SnapshotStats},
};

/// Per-request defaults applied when a query leaves a parameter out
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDefaults {
    pub user: UserParams,
    pub item: ItemParams,
    pub hybrid: HybridParams,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<RwLock<AppStateInner>>,
    pub loader: Arc<dyn DatasetLoader>,
    pub defaults: RequestDefaults,
}

/// State replaced on reload
pub struct AppStateInner {
    pub snapshot: Arc<DatasetSnapshot>,
    pub popularity_floor: usize,
}

impl AppState {
    /// Creates state serving `snapshot`, reloading through `loader`
    pub fn new(
        snapshot: DatasetSnapshot,
        popularity_floor: usize,
        loader: Arc<dyn DatasetLoader>,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppStateInner {
                snapshot: Arc::new(snapshot),
                popularity_floor,
            })),
            loader,
            defaults,
        }
    }

    /// The snapshot current at the time of the call
    ///
    /// The read lock is held only long enough to clone the `Arc`.
    pub async fn snapshot(&self) -> Arc<DatasetSnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    /// Loads the dataset again, builds a new snapshot and swaps it in
    ///
    /// A failed load or build leaves the current snapshot in place.
    pub async fn reload(&self, popularity_floor: Option<usize>) -> AppResult<SnapshotStats> {
        let floor = match popularity_floor {
            Some(floor) => floor,
            None => self.inner.read().await.popularity_floor,
        };

        let dataset = load_dataset(self.loader.as_ref()).await?;
        let snapshot = tokio::task::spawn_blocking(move || {
            DatasetSnapshot::build(&dataset.ratings, dataset.catalog, floor)
        })
        .await??;
        let stats = snapshot.stats();

        let mut inner = self.inner.write().await;
        inner.snapshot = Arc::new(snapshot);
        inner.popularity_floor = floor;

        tracing::info!(snapshot_id = %stats.snapshot_id, "Snapshot swapped");

        Ok(stats)
    }
}
