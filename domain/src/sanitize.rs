//! Free-text sanitizer applied to submitted names, descriptions,
//! organizations and locations before they are validated or stored.
//!
//! Three passes, in order:
//! 1. remove `<script ...>...</script>` blocks (case-insensitive, one
//!    non-overlapping left-to-right pass, body must sit on one line);
//! 2. remove emoji in the ranges U+1F600-1F64F, U+1F300-1F5FF,
//!    U+1F680-1F6FF and U+1F1E0-1F1FF;
//! 3. escape `&`, `<`, `>`, `"` and `'` as HTML entities.
//!
//! This is a pattern filter, not an HTML parser. Nested or split script tags
//! and script embedded in attributes (`onclick=...`) are not removed by pass 1;
//! pass 3 still neutralizes their markup.
//!
//! Sanitizing is not idempotent: an already escaped `&amp;` becomes
//! `&amp;amp;`. Sanitize raw input exactly once.

use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<script\b[^>]*>(.*?)</script>").expect("script block regex")
});

static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F1E0}-\x{1F1FF}]+")
        .expect("emoji regex")
});

/// Text that went through [`sanitize`]. Only constructible by sanitizing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for SanitizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for SanitizedText {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitize a raw free-text value.
///
/// `None` and `""` both yield `None`, meaning "field absent". A non-empty
/// input always yields `Some`, possibly empty after removal.
pub fn sanitize<'a>(input: impl Into<Option<&'a str>>) -> Option<SanitizedText> {
    let input = input.into().filter(|s| !s.is_empty())?;
    let without_scripts = SCRIPT_BLOCK_RE.replace_all(input, "");
    let without_emoji = EMOJI_RE.replace_all(&without_scripts, "");
    Some(SanitizedText(escape_html(&without_emoji)))
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(c),
        }
    }
    output
}
