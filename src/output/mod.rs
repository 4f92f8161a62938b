//! Output module for sitemaps and crawl reports
//!
//! This module handles:
//! - Generating sitemap 0.9 XML from crawl results
//! - Writing the sitemap to disk
//! - Computing and printing crawl statistics

mod sitemap;
pub mod stats;

pub use sitemap::{build_sitemap, write_sitemap, SITEMAP_NAMESPACE};
pub use stats::{print_statistics, CrawlStats};
