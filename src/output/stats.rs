//! Statistics generation from crawl results
//!
//! This module provides functionality for summarizing and displaying the
//! results of a finished crawl.

use crate::crawler::CrawlResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// Total number of pages fetched and recorded
    pub pages_fetched: usize,

    /// Pages with a 2xx response
    pub pages_succeeded: usize,

    /// Pages with an error status or transport failure
    pub pages_failed: usize,

    /// Count of pages by status code (including 408/503 sentinels)
    pub status_codes: BTreeMap<u16, usize>,

    /// Total number of links extracted across all pages
    pub total_links: usize,

    /// Deepest page recorded (seed = 1); 0 when nothing was fetched
    pub max_depth_reached: u32,

    /// Wall-clock duration of the session
    pub duration: Duration,
}

impl CrawlStats {
    /// Computes statistics over a session's results
    ///
    /// # Arguments
    ///
    /// * `results` - Recorded results keyed by canonical URL
    /// * `duration` - How long the session ran
    pub fn from_results(results: &BTreeMap<String, Arc<CrawlResult>>, duration: Duration) -> Self {
        let mut stats = Self {
            duration,
            ..Self::default()
        };

        for result in results.values() {
            stats.pages_fetched += 1;
            if result.is_success() {
                stats.pages_succeeded += 1;
            } else {
                stats.pages_failed += 1;
            }
            *stats.status_codes.entry(result.status_code).or_insert(0) += 1;
            stats.total_links += result.discovered_links.len();
            stats.max_depth_reached = stats.max_depth_reached.max(result.depth);
        }

        stats
    }

    /// Share of fetched pages that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.pages_fetched == 0 {
            0.0
        } else {
            (self.pages_succeeded as f64 / self.pages_fetched as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages fetched: {}", stats.pages_fetched);
    println!("  Total links found: {}", stats.total_links);
    println!("  Max depth reached: {}", stats.max_depth_reached);
    println!("  Duration: {:.2}s", stats.duration.as_secs_f64());
    println!();

    if !stats.status_codes.is_empty() {
        println!("Pages by Status:");
        // Sort by count (descending)
        let mut status_counts: Vec<_> = stats.status_codes.iter().collect();
        status_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        for (status, count) in status_counts {
            let percentage = (*count as f64 / stats.pages_fetched as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", status, count, percentage);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully fetched)",
        stats.success_rate(),
        stats.pages_succeeded,
        stats.pages_fetched
    );
}
