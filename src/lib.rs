pub mod analysis;
pub mod config;
pub mod export;
pub mod filter;
pub mod loader;
pub mod models;
pub mod registry;
pub mod report;
pub mod store;
