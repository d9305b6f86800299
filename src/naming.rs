//! Destination naming: template rendering, sanitizing and validation of file names.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Default template for episode file names.
pub const DEFAULT_EPISODE_TEMPLATE: &str = "{show} - S{season:02}E{episode:02} - {title}";

/// Default template for movie file names.
pub const DEFAULT_MOVIE_TEMPLATE: &str = "{title}";

/// Punctuation allowed in destination file names in addition to ASCII letters, digits and space.
pub const ACCEPTED_PUNCTUATION: &str = "-_.,'()[]{}!&+#@$%~;=";

/// Placeholder such as `{show}` or `{episode:02}`
static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(show|season|episode|title)(?::0(\d))?\}").expect("Invalid placeholder regex"));

/// Separator left dangling after an empty placeholder, like `Show -  - Title`
static RE_EMPTY_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+-\s+-\s+").expect("Invalid empty segment regex"));

static RE_MULTI_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("Invalid spaces regex"));

/// Template for building destination file stems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    pattern: String,
}

impl Default for NamingTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_EPISODE_TEMPLATE)
    }
}

impl NamingTemplate {
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    #[must_use]
    pub fn movie() -> Self {
        Self::new(DEFAULT_MOVIE_TEMPLATE)
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render a sanitized file stem.
    ///
    /// Numeric placeholders accept zero padding with `:0N`.
    /// A missing number renders as empty and the separator it leaves behind is collapsed.
    #[must_use]
    pub fn render(&self, show: &str, season: Option<u32>, episode: Option<u32>, title: &str) -> String {
        let rendered = RE_PLACEHOLDER.replace_all(&self.pattern, |caps: &Captures| {
            let width: usize = caps.get(2).and_then(|w| w.as_str().parse().ok()).unwrap_or(0);
            match &caps[1] {
                "show" => show.to_string(),
                "title" => title.to_string(),
                "season" => season.map_or_else(String::new, |n| format!("{n:0width$}")),
                "episode" => episode.map_or_else(String::new, |n| format!("{n:0width$}")),
                other => other.to_string(),
            }
        });

        let collapsed = RE_EMPTY_SEGMENT.replace_all(&rendered, " - ");
        sanitize_filename(collapsed.trim_matches(|c: char| c == '-' || c.is_whitespace()))
    }
}

/// Check if a character is in the accepted file name character set.
#[must_use]
pub fn is_accepted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || ACCEPTED_PUNCTUATION.contains(c)
}

/// Check that a file name only contains accepted characters.
#[must_use]
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && name.chars().all(is_accepted_char)
}

/// Convert a display title into an accepted file name.
///
/// Characters with a plain ASCII decomposition are transliterated (`é` → `e`),
/// path separators become dashes, a colon becomes ` -`, and anything else outside the accepted set is dropped.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.nfkd() {
        match c {
            ':' => result.push_str(" -"),
            '/' | '\\' | '|' => result.push('-'),
            '\t' | '\n' | '\r' => result.push(' '),
            c if is_accepted_char(c) => result.push(c),
            _ => {}
        }
    }

    let result = RE_MULTI_SPACES.replace_all(&result, " ");
    result.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string()
}

/// Join a file stem and an extension.
#[must_use]
pub fn with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}
