//! Ingestion of JEPX day-ahead spot prices into one canonical CSV per fiscal year.

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fiscal;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod store;
