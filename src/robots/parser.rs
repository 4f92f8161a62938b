//! Robots.txt parser implementation
//!
//! Extracts the disallow rules that apply to this crawler and matches URL
//! paths against them.

use regex::Regex;

/// A single compiled disallow pattern
#[derive(Debug, Clone)]
enum DisallowPattern {
    /// Plain path prefix, or a pattern with a trailing `*`
    Prefix(String),
    /// Pattern with a leading `*`
    Suffix(String),
    /// Pattern with `*` in the middle, anchored on both ends
    Wildcard(Regex),
}

impl DisallowPattern {
    fn compile(raw: &str) -> Self {
        if let Some(prefix) = raw.strip_suffix('*') {
            return Self::Prefix(prefix.to_string());
        }

        if let Some(suffix) = raw.strip_prefix('*') {
            return Self::Suffix(suffix.to_string());
        }

        if raw.contains('*') {
            let escaped: Vec<String> = raw.split('*').map(regex::escape).collect();
            let source = format!("^{}$", escaped.join(".*"));
            return match Regex::new(&source) {
                Ok(regex) => Self::Wildcard(regex),
                Err(e) => {
                    tracing::warn!("Unusable robots.txt pattern {:?}: {}", raw, e);
                    Self::Prefix(raw.replace('*', ""))
                }
            };
        }

        Self::Prefix(raw.to_string())
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Suffix(suffix) => path.ends_with(suffix.as_str()),
            Self::Wildcard(regex) => regex.is_match(path),
        }
    }
}

/// Disallow rules for one domain
///
/// Holds the rules of the relevant `User-agent` group (the one naming this
/// crawler or `*`). When a file has several relevant groups, the last one
/// with at least one `Disallow` line wins and earlier ones are discarded.
#[derive(Debug, Clone)]
pub struct RobotsRuleSet {
    domain: String,
    disallow_patterns: Vec<String>,
    compiled: Vec<DisallowPattern>,
    crawl_delay: Option<f64>,
}

/// Accumulator for the group currently being read
#[derive(Default)]
struct Group {
    relevant: bool,
    /// Still reading the group's `User-agent` lines
    collecting_agents: bool,
    disallows: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsRuleSet {
    /// Creates a rule set that allows everything
    ///
    /// Used when robots.txt is missing, unreachable, or fetching was cancelled.
    pub fn allow_all(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            disallow_patterns: Vec::new(),
            compiled: Vec::new(),
            crawl_delay: None,
        }
    }

    /// Parses robots.txt content for the given crawler agent
    ///
    /// # Arguments
    ///
    /// * `domain` - The domain the file was fetched from
    /// * `content` - The raw robots.txt text
    /// * `agent` - The crawler's robots token (its name); a group is relevant
    ///   when one of its tokens is `*` or names the same product, compared
    ///   case-insensitively and ignoring any `/version` suffix
    pub fn parse(domain: impl Into<String>, content: &str, agent: &str) -> Self {
        let agent = product_token(agent);

        let mut committed: Option<(Vec<String>, Option<f64>)> = None;
        let mut group = Group::default();
        let mut last_relevant_delay: Option<f64> = None;

        for line in content.lines() {
            // Strip comments
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !group.collecting_agents {
                        // A new group starts; commit the one just finished
                        Self::commit(&mut committed, std::mem::take(&mut group));
                        group.collecting_agents = true;
                    }

                    let token = product_token(value);
                    if token == "*" || (!token.is_empty() && token == agent) {
                        group.relevant = true;
                    }
                }
                "disallow" => {
                    group.collecting_agents = false;
                    if group.relevant && !value.is_empty() {
                        group.disallows.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    group.collecting_agents = false;
                    if group.relevant {
                        if let Ok(delay) = value.parse::<f64>() {
                            if delay.is_finite() && delay >= 0.0 {
                                group.crawl_delay = Some(delay);
                                last_relevant_delay = Some(delay);
                            }
                        }
                    }
                }
                _ => {
                    // Allow, Sitemap, and unknown directives close the agent list
                    group.collecting_agents = false;
                }
            }
        }
        Self::commit(&mut committed, group);

        let (disallow_patterns, crawl_delay) = match committed {
            Some((patterns, delay)) => (patterns, delay.or(last_relevant_delay)),
            None => (Vec::new(), last_relevant_delay),
        };
        let compiled = disallow_patterns
            .iter()
            .map(|p| DisallowPattern::compile(p))
            .collect();

        Self {
            domain: domain.into(),
            disallow_patterns,
            compiled,
            crawl_delay,
        }
    }

    fn commit(committed: &mut Option<(Vec<String>, Option<f64>)>, group: Group) {
        if group.relevant && !group.disallows.is_empty() {
            *committed = Some((group.disallows, group.crawl_delay));
        }
    }

    /// The domain these rules belong to
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The disallow patterns in file order
    pub fn disallow_patterns(&self) -> &[String] {
        &self.disallow_patterns
    }

    /// Crawl-delay in seconds declared for this crawler, if any
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }

    /// Checks whether a path (optionally with `?query`) may be fetched
    ///
    /// The first matching disallow pattern denies; no match allows.
    pub fn is_allowed(&self, path: &str) -> bool {
        !self.compiled.iter().any(|pattern| pattern.matches(path))
    }
}

/// Lowercased product name of a user-agent token: `"RippleMap/1.0"` -> `"ripplemap"`
fn product_token(agent: &str) -> String {
    agent
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}
