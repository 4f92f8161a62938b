//! Configuration module for Ripplemap
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ripplemap::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ripplemap.toml")).unwrap();
//! println!("Crawler will stop after {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

pub use validation::{validate_crawler_config, validate_user_agent_config};
