pub mod analyzer;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod scraper;
pub mod store;
pub mod types;
