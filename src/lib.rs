pub mod alerter;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod harvest;
pub mod indicators;
pub mod locale;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod watchlist;
