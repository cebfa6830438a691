use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    error::{AppError, AppResult},
    models::{CatalogEntry, ItemId, RatingRecord},
};

use super::DatasetLoader;

const RATINGS_QUERY: &str = "SELECT user_id, movie_id, rating, rated_at FROM ratings";
const MOVIES_QUERY: &str = "SELECT movie_id, title, genres FROM movies";

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

#[derive(Debug, FromRow)]
struct RatingRow {
    user_id: i32,
    movie_id: i32,
    rating: f64,
    rated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct MovieRow {
    movie_id: i32,
    title: String,
    genres: Option<String>,
}

fn to_id(raw: i32, column: &str) -> AppResult<u32> {
    u32::try_from(raw)
        .map_err(|_| AppError::InvalidInput(format!("Negative {} in database: {}", column, raw)))
}

impl TryFrom<RatingRow> for RatingRecord {
    type Error = AppError;

    fn try_from(row: RatingRow) -> AppResult<Self> {
        Ok(RatingRecord::new(
            to_id(row.user_id, "user_id")?,
            to_id(row.movie_id, "movie_id")?,
            row.rating,
            row.rated_at,
        ))
    }
}

impl TryFrom<MovieRow> for CatalogEntry {
    type Error = AppError;

    fn try_from(row: MovieRow) -> AppResult<Self> {
        Ok(CatalogEntry::new(
            ItemId(to_id(row.movie_id, "movie_id")?),
            row.title,
            row.genres.as_deref().unwrap_or_default(),
        ))
    }
}

/// Reads ratings and movies from the `ratings` and `movies` tables
#[derive(Debug, Clone)]
pub struct PgLoader {
    pool: PgPool,
}

impl PgLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DatasetLoader for PgLoader {
    async fn load_ratings(&self) -> AppResult<Vec<RatingRecord>> {
        let rows: Vec<RatingRow> = sqlx::query_as(RATINGS_QUERY).fetch_all(&self.pool).await?;
        tracing::debug!(rows = rows.len(), "Fetched rating rows");
        rows.into_iter().map(RatingRecord::try_from).collect()
    }

    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>> {
        let rows: Vec<MovieRow> = sqlx::query_as(MOVIES_QUERY).fetch_all(&self.pool).await?;
        rows.into_iter().map(CatalogEntry::try_from).collect()
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    #[test]
    fn test_rating_row_conversion() {
        let row = RatingRow {
            user_id: 103692,
            movie_id: 296,
            rating: 5.0,
            rated_at: Utc::now(),
        };
        let record = RatingRecord::try_from(row).unwrap();
        assert_eq!(record.user_id, UserId(103692));
        assert_eq!(record.item_id, ItemId(296));
    }

    #[test]
    fn test_negative_id_rejected() {
        let row = RatingRow {
            user_id: -1,
            movie_id: 296,
            rating: 5.0,
            rated_at: Utc::now(),
        };
        assert!(matches!(
            RatingRecord::try_from(row),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_movie_without_genres() {
        let row = MovieRow {
            movie_id: 131262,
            title: "Innocence (2014)".to_string(),
            genres: None,
        };
        let entry = CatalogEntry::try_from(row).unwrap();
        assert!(entry.genres.is_empty());
    }
}
