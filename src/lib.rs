//! Cosmos Wire - a two-feed web aggregator
//!
//! Serves NASA's Astronomy Picture of the Day and NewsAPI headlines side by
//! side, and lets users keep a saved collection of either in SQLite. Upstream
//! or storage failures degrade the page instead of failing the request.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod headlines;
pub mod pictures;
pub mod routes;
pub mod store;
