// src/ingest/providers/mod.rs
pub mod news_api;

pub use news_api::{NewsApiProvider, NEWS_API_URL};
