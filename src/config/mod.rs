//! Configuration module for Wikiharvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files.
//!
//! # Example
//!
//! ```no_run
//! use wikiharvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Harvest will use {} connections", config.harvester.max_connections);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, HarvesterConfig, OutputConfig, SeedEntry};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
