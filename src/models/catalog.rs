use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::ItemId;

/// Marker MovieLens uses for a movie without genres
const NO_GENRES: &str = "(no genres listed)";

/// A movie in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_id: ItemId,
    pub title: String,
    pub genres: BTreeSet<String>,
}

impl CatalogEntry {
    /// Creates an entry from a `|`-separated genre field
    pub fn new(item_id: ItemId, title: String, genres: &str) -> Self {
        Self {
            item_id,
            title,
            genres: parse_genres(genres),
        }
    }
}

fn parse_genres(raw: &str) -> BTreeSet<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|genre| !genre.is_empty() && *genre != NO_GENRES)
        .map(str::to_string)
        .collect()
}

/// Item metadata lookup used to turn recommended ids into titles
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<ItemId, CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.item_id, e)).collect(),
        }
    }

    pub fn get(&self, item_id: ItemId) -> Option<&CatalogEntry> {
        self.entries.get(&item_id)
    }

    pub fn title(&self, item_id: ItemId) -> Option<&str> {
        self.get(item_id).map(|e| e.title.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
