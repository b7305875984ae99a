// src/compose.rs
//! Announcement text. One line, at most 140 budgeted characters.
//!
//! URLs are charged a fixed width because the platform rewrites every link
//! to a short one of that length.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::Config;
use crate::index::types::PackageMetadata;

pub const MAX_CHARS: usize = 140;
pub const SHORT_URL_CHARS: usize = 21;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    New,
    Update,
}

impl EventTag {
    pub fn label(self) -> &'static str {
        match self {
            EventTag::New => "[NEW]",
            EventTag::Update => "[UPDATE]",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::New => "new",
            EventTag::Update => "update",
        }
    }
}

fn is_url(token: &str) -> bool {
    let lower = token.get(..8).unwrap_or(token).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Width of a single token as the platform counts it.
pub fn token_width(token: &str) -> usize {
    if is_url(token) {
        SHORT_URL_CHARS
    } else {
        token.chars().count()
    }
}

/// Width of tokens joined by single spaces.
pub fn budgeted_len<S: AsRef<str>>(tokens: &[S]) -> usize {
    let words: usize = tokens.iter().map(|t| token_width(t.as_ref())).sum();
    words + tokens.len().saturating_sub(1)
}

/// Collapse newlines and runs of whitespace.
fn single_line(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re.replace_all(s.trim(), " ").into_owned()
}

/// Summary as it fits into `remaining` characters, or `None` when there is
/// no room for more than an ellipsis.
fn fit_summary(summary: &str, remaining: usize) -> Option<String> {
    if summary.chars().count() <= remaining {
        return Some(summary.to_string());
    }
    if remaining <= ELLIPSIS.len() {
        return None;
    }
    let mut cut: String = summary.chars().take(remaining - ELLIPSIS.len()).collect();
    cut.push_str(ELLIPSIS);
    Some(cut)
}

#[derive(Debug, Clone)]
pub struct Composer {
    index_url: String,
    mirror_url: String,
    index_label: String,
    homepage_label: String,
    hashtag: String,
}

impl Default for Composer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Composer {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            index_url: cfg.index_url.trim_end_matches('/').to_string(),
            mirror_url: cfg.mirror_url.trim_end_matches('/').to_string(),
            index_label: cfg.index_label.clone(),
            homepage_label: cfg.homepage_label.clone(),
            hashtag: cfg.hashtag.clone(),
        }
    }

    pub fn index_page(&self, name: &str) -> String {
        format!("{}/{}/", self.index_url, name)
    }

    pub fn mirror_page(&self, name: &str) -> String {
        format!("{}/{}/", self.mirror_url, name)
    }

    /// Home page as a single link token. Hosts without a scheme get
    /// `http://` so they are charged as a link; values containing
    /// whitespace are not links at all and fall back to the mirror.
    fn home_link(&self, name: &str, meta: &PackageMetadata) -> String {
        match meta.home_page() {
            Some(h) if h.contains(char::is_whitespace) => self.mirror_page(name),
            Some(h) if is_url(h) => h.to_string(),
            Some(h) => format!("http://{h}"),
            None => self.mirror_page(name),
        }
    }

    pub fn compose(&self, name: &str, meta: &PackageMetadata, tag: EventTag) -> String {
        let homepage = self.home_link(name, meta);

        let mut tokens = vec![
            tag.label().to_string(),
            name.to_string(),
            self.index_label.clone(),
            self.index_page(name),
            self.homepage_label.clone(),
            homepage,
            self.hashtag.clone(),
        ];

        if let Some(summary) = meta.summary().map(single_line) {
            // +1 for the space in front of the summary
            let remaining = MAX_CHARS.saturating_sub(budgeted_len(&tokens) + 1);
            if let Some(s) = fit_summary(&summary, remaining) {
                tokens.insert(2, s);
            }
        }

        tokens.join(" ")
    }
}
