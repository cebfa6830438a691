use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{parse_timestamp, CatalogEntry, ItemId, RatingRecord},
};

use super::DatasetLoader;

/// Row of MovieLens `rating.csv`: `userId,movieId,rating,timestamp`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingRow {
    user_id: u32,
    movie_id: u32,
    rating: f64,
    timestamp: String,
}

/// Row of MovieLens `movie.csv`: `movieId,title,genres`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieRow {
    movie_id: u32,
    title: String,
    genres: String,
}

/// Reads the MovieLens CSV pair from disk
#[derive(Debug, Clone)]
pub struct CsvLoader {
    ratings_path: PathBuf,
    movies_path: PathBuf,
}

impl CsvLoader {
    pub fn new(ratings_path: impl AsRef<Path>, movies_path: impl AsRef<Path>) -> Self {
        Self {
            ratings_path: ratings_path.as_ref().to_path_buf(),
            movies_path: movies_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl DatasetLoader for CsvLoader {
    async fn load_ratings(&self) -> AppResult<Vec<RatingRecord>> {
        let path = self.ratings_path.clone();
        tracing::info!(path = %path.display(), "Reading ratings");
        tokio::task::spawn_blocking(move || -> AppResult<Vec<RatingRecord>> {
            let file = std::fs::File::open(&path)?;
            read_ratings(file)
        })
        .await?
    }

    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>> {
        let path = self.movies_path.clone();
        tracing::info!(path = %path.display(), "Reading movies");
        tokio::task::spawn_blocking(move || -> AppResult<Vec<CatalogEntry>> {
            let file = std::fs::File::open(&path)?;
            read_catalog(file)
        })
        .await?
    }

    fn name(&self) -> &'static str {
        "movielens-csv"
    }
}

/// Parses a ratings CSV with a header row
pub fn read_ratings<R: Read>(source: R) -> AppResult<Vec<RatingRecord>> {
    let mut reader = csv::Reader::from_reader(source);
    let mut records = Vec::new();

    for row in reader.deserialize::<RatingRow>() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Unparseable timestamp {:?} for user {} movie {}",
                row.timestamp, row.user_id, row.movie_id
            ))
        })?;
        records.push(RatingRecord::new(
            row.user_id,
            row.movie_id,
            row.rating,
            timestamp,
        ));
    }

    Ok(records)
}

/// Parses a movies CSV with a header row
pub fn read_catalog<R: Read>(source: R) -> AppResult<Vec<CatalogEntry>> {
    let mut reader = csv::Reader::from_reader(source);
    reader
        .deserialize::<MovieRow>()
        .map(|row| {
            let row = row?;
            Ok(CatalogEntry::new(ItemId(row.movie_id), row.title, &row.genres))
        })
        .collect()
}
