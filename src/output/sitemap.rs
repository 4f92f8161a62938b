//! Sitemap generation
//!
//! Emits the sitemaps.org 0.9 format: one `<url>` entry per successfully
//! fetched page, in canonical URL order.

use crate::crawler::CrawlResult;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// XML namespace of the sitemap protocol
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const CHANGE_FREQUENCY: &str = "weekly";
const PRIORITY: &str = "0.5";

/// Builds sitemap XML from crawl results
///
/// Only successful results (2xx with a body) are listed. Entries appear in the order the
/// iterator yields them; pass results from a `BTreeMap` keyed by canonical
/// URL for a stable, sorted sitemap.
///
/// # Arguments
///
/// * `results` - The recorded results
/// * `lastmod` - Date written to every `<lastmod>` (the session start date)
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use ripplemap::output::build_sitemap;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let xml = build_sitemap(std::iter::empty(), date);
/// assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
/// assert!(xml.contains("<urlset"));
/// ```
pub fn build_sitemap<'a>(
    results: impl IntoIterator<Item = &'a CrawlResult>,
    lastmod: NaiveDate,
) -> String {
    let lastmod = lastmod.format("%Y-%m-%d").to_string();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<urlset xmlns=\"{}\">", SITEMAP_NAMESPACE);

    for result in results.into_iter().filter(|r| r.is_success()) {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(&result.url));
        let _ = writeln!(xml, "    <lastmod>{}</lastmod>", lastmod);
        let _ = writeln!(xml, "    <changefreq>{}</changefreq>", CHANGE_FREQUENCY);
        let _ = writeln!(xml, "    <priority>{}</priority>", PRIORITY);
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

/// Escapes text for an XML element, including both quote characters
fn escape_xml(text: &str) -> String {
    html_escape::encode_text(text)
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Writes sitemap XML to `path`, creating parent directories as needed
pub fn write_sitemap(path: &Path, xml: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, xml)?;
    tracing::info!("Sitemap written to {}", path.display());
    Ok(())
}
