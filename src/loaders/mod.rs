//! Dataset loaders
//!
//! The engine consumes plain rating records and catalog entries. Each loader knows one source
//! layout (MovieLens CSV files, a PostgreSQL schema) and produces both.

use crate::{
    config::{Config, DatasetSource},
    error::AppResult,
    models::{CatalogEntry, RatingRecord},
};
use std::sync::Arc;

pub mod movielens_csv;
pub mod postgres;

pub use movielens_csv::CsvLoader;
pub use postgres::PgLoader;

/// Ratings and catalog read in one go
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub ratings: Vec<RatingRecord>,
    pub catalog: Vec<CatalogEntry>,
}

/// Source of the rating dataset and movie catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Every rating record in the source
    async fn load_ratings(&self) -> AppResult<Vec<RatingRecord>>;

    /// Every movie in the source
    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>>;

    /// Loader name for logging
    fn name(&self) -> &'static str;
}

/// Loads ratings and catalog concurrently
pub async fn load_dataset(loader: &dyn DatasetLoader) -> AppResult<Dataset> {
    let (ratings, catalog) = tokio::try_join!(loader.load_ratings(), loader.load_catalog())?;

    tracing::info!(
        loader = loader.name(),
        ratings = ratings.len(),
        movies = catalog.len(),
        "Dataset loaded"
    );

    Ok(Dataset { ratings, catalog })
}

/// Builds the loader selected by configuration
pub async fn from_config(config: &Config) -> anyhow::Result<Arc<dyn DatasetLoader>> {
    let loader: Arc<dyn DatasetLoader> = match config.dataset_source {
        DatasetSource::Csv => Arc::new(CsvLoader::new(&config.ratings_path, &config.movies_path)),
        DatasetSource::Postgres => {
            let pool = postgres::create_pool(&config.database_url).await?;
            Arc::new(PgLoader::new(pool))
        }
    };
    Ok(loader)
}
