//! Hybrid movie recommender: user-based and item-based collaborative filtering over a
//! popularity-filtered rating matrix, served over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod loaders;
pub mod middleware;
pub mod models;
pub mod services;
