//! xfeed - A Twitter and RSS Feed Aggregator
//!
//! This crate pulls items from Twitter timelines and RSS feeds into a SQLite
//! store, deduplicated per feed, and renders them as embeddable HTML lists.

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod refresher;
pub mod render;
pub mod routes;
pub mod rss;
pub mod twitter;
