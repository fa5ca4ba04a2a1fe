use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use unicode_segmentation::UnicodeSegmentation;

pub const MSG_NEW_SECTION_HEADER: &str = "newsectionheaderdefaultlevel";
pub const MSG_ELLIPSIS: &str = "ellipsis";
pub const MSG_REDIRECT_TO: &str = "redirectto";
pub const MSG_SIGNATURE: &str = "signature";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern"));

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (MSG_NEW_SECTION_HEADER, "== $1 =="),
    (MSG_ELLIPSIS, "..."),
    (MSG_REDIRECT_TO, "Redirect to:"),
    (MSG_SIGNATURE, "[[User:$1|$2]] ([[User talk:$1|talk]])"),
    ("talkpagelinktext", "talk"),
];

/// Locale-dependent text services used by content operations.
pub trait Language: Send + Sync + fmt::Debug {
    fn code(&self) -> &str;

    /// Raw message text with `$1..$n` replaced by `params`.
    fn message(&self, key: &str, params: &[String]) -> Option<String>;

    fn format_timestamp(&self, timestamp: DateTime<Utc>) -> String;

    /// Prepares text for line-based diffing. Languages without word
    /// separators may insert break points here.
    fn segment_for_diff<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    /// Truncates to at most `max_bytes` bytes including the ellipsis,
    /// cutting only at grapheme boundaries.
    fn truncate(&self, text: &str, max_bytes: usize) -> String {
        let ellipsis = self
            .message(MSG_ELLIPSIS, &[])
            .unwrap_or_else(|| "...".to_string());
        truncate_graphemes(text, max_bytes, &ellipsis)
    }
}

/// Message-table backed language, seeded with English defaults.
#[derive(Debug, Clone)]
pub struct ContentLanguage {
    code: String,
    messages: HashMap<String, String>,
}

impl ContentLanguage {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            messages: DEFAULT_MESSAGES
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
        }
    }

    pub fn with_message(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.messages.insert(key.into(), value.into());
        self
    }
}

impl Default for ContentLanguage {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CONTENT_LANGUAGE)
    }
}

impl Language for ContentLanguage {
    fn code(&self) -> &str {
        &self.code
    }

    fn message(&self, key: &str, params: &[String]) -> Option<String> {
        self.messages
            .get(key)
            .map(|template| substitute_params(template, params))
    }

    fn format_timestamp(&self, timestamp: DateTime<Utc>) -> String {
        timestamp.format("%H:%M, %-d %B %Y (UTC)").to_string()
    }
}

/// Replaces `$1..$n` placeholders in one pass; substituted values are never rescanned.
/// Placeholders without a matching parameter are left as written.
pub fn substitute_params(template: &str, params: &[String]) -> String {
    PLACEHOLDER
        .replace_all(template, |captures: &Captures<'_>| {
            captures[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| index.checked_sub(1))
                .and_then(|index| params.get(index))
                .cloned()
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

pub(crate) fn truncate_graphemes(text: &str, max_bytes: usize, ellipsis: &str) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let budget = max_bytes.saturating_sub(ellipsis.len());
    if budget == 0 {
        return if ellipsis.len() <= max_bytes {
            ellipsis.to_string()
        } else {
            String::new()
        };
    }

    let mut used = 0usize;
    let mut output = String::with_capacity(max_bytes);
    for grapheme in text.graphemes(true) {
        if used + grapheme.len() > budget {
            break;
        }
        used += grapheme.len();
        output.push_str(grapheme);
    }
    let mut output = output.trim_end().to_string();
    output.push_str(ellipsis);
    output
}
