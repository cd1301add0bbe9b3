//! Configuration module for crawl-agent
//!
//! Handles loading, parsing, and validating the optional TOML configuration file
//! and resolving the chat API key from the environment.
//!
//! # Example
//!
//! ```no_run
//! use crawl_agent::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl-agent.toml")).unwrap();
//! println!("Index lives at: {}", config.storage.index_path.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, LlmConfig, NetworkConfig, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_api_key};
