mod catalog;
mod params;
mod rating;

pub use catalog::{Catalog, CatalogEntry};
pub use params::*;
pub use rating::{parse_timestamp, ItemId, RatingRecord, UserId};
