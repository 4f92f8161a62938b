//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Same-host links worth crawling (from `<a>` tags)
//! - Page title

use crate::url::{is_crawlable, is_root_path, same_host};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Crawlable same-host links found on the page (absolute, no query or fragment)
    pub links: BTreeSet<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
/// - Links to another host
/// - Links to media, documents, archives, and other non-page resources
/// - `/cgi-bin/` and `/cdn-cgi/` paths
/// - Links to the site root
///
/// Query strings and fragments are stripped, so `/a?x=1` and `/a#top` both
/// yield `/a`. `rel="nofollow"` links are followed.
///
/// Parsing never fails; malformed markup yields whatever anchors survive.
///
/// # Example
///
/// ```
/// use ripplemap::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert!(parsed.links.contains("https://example.com/page"));
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: collect_links(&document, page_url),
    }
}

/// Convenience function for extracting just the links from HTML
pub fn extract_links(html: &str, page_url: &Url) -> BTreeSet<String> {
    collect_links(&Html::parse_document(html), page_url)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collect_links(document: &Html, page_url: &Url) -> BTreeSet<String> {
    let mut links = BTreeSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(link) = resolve_link(href, page_url) {
                links.insert(link);
            }
        }
    }

    links
}

/// Resolves a redirect `Location` against the page that returned it
///
/// Applies the same rules as link extraction, except that the site root is
/// accepted so `http://host/` may redirect to `https://host/`.
///
/// ```
/// use ripplemap::crawler::resolve_redirect;
/// use url::Url;
///
/// let page = Url::parse("https://example.com/go").unwrap();
/// assert_eq!(
///     resolve_redirect("/docs/?tab=1", &page).as_deref(),
///     Some("https://example.com/docs/")
/// );
/// assert_eq!(resolve_redirect("https://other.example/", &page), None);
/// ```
pub fn resolve_redirect(location: &str, page_url: &Url) -> Option<String> {
    resolve_target(location, page_url).map(String::from)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded (see [`parse_html`]).
fn resolve_link(href: &str, page_url: &Url) -> Option<String> {
    resolve_target(href, page_url)
        .filter(|url| !is_root_path(url))
        .map(String::from)
}

fn resolve_target(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = page_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }

    absolute_url.set_query(None);
    absolute_url.set_fragment(None);

    if !same_host(&absolute_url, page_url) || !is_crawlable(&absolute_url) {
        return None;
    }

    Some(absolute_url)
}
