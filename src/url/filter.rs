//! Crawlable-content filtering
//!
//! Links pointing at media, binary, or document files and at administrative
//! paths are never worth fetching as pages.

use url::Url;

/// File extensions that never lead to an HTML page
const BLOCKED_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff", "avif",
    // video
    "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "m4v", "mpg", "mpeg",
    // audio
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "wma",
    // data and feeds
    "xml", "rss", "atom", "json", "csv",
    // archives and binaries
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz", "exe", "msi", "dmg", "iso", "apk", "bin",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "epub",
    // assets
    "css", "js", "woff", "woff2", "ttf", "eot",
];

/// Path fragments of server administration endpoints
const BLOCKED_PATH_SEGMENTS: &[&str] = &["/cgi-bin/", "/cdn-cgi/"];

/// Returns true if the URL's last path segment has a blocked extension
pub fn has_blocked_extension(url: &Url) -> bool {
    let last_segment = url.path().rsplit('/').next().unwrap_or_default();

    match last_segment.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            let extension = extension.to_ascii_lowercase();
            BLOCKED_EXTENSIONS.contains(&extension.as_str())
        }
        _ => false,
    }
}

/// Returns true if the URL is under an administrative path
pub fn is_admin_path(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    BLOCKED_PATH_SEGMENTS
        .iter()
        .any(|segment| path.contains(segment) || path == segment.trim_end_matches('/'))
}

/// Returns true if the URL's path denotes nothing but the site root
pub fn is_root_path(url: &Url) -> bool {
    matches!(url.path(), "" | "/")
}

/// Returns true if the URL may lead to a crawlable HTML page
pub fn is_crawlable(url: &Url) -> bool {
    !has_blocked_extension(url) && !is_admin_path(url)
}
