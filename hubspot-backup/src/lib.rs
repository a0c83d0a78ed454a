//! HubSpot Backup Library
//!
//! Exports every record of a HubSpot account as one JSON file per item,
//! under `<output_dir>/<YYYY-MM-DD>/<endpoint>/<index>.json`.

pub mod account;
pub mod config;
pub mod crawler;
pub mod endpoints;
pub mod envelope;
pub mod pagination;
pub mod progress;
pub mod transport;
pub mod utils;
pub mod writer;

// Re-export commonly used types
pub use crate::config::Config;
pub use crawler::{BackupReport, Crawler};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
