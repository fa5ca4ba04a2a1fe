use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const MODEL_WIKITEXT: &str = "wikitext";
pub const MODEL_JAVASCRIPT: &str = "javascript";
pub const MODEL_CSS: &str = "css";
pub const MODEL_TEXT: &str = "text";

pub const FORMAT_WIKITEXT: &str = "text/x-wiki";
pub const FORMAT_JAVASCRIPT: &str = "text/javascript";
pub const FORMAT_CSS: &str = "text/css";
pub const FORMAT_TEXT: &str = "text/plain";

/// Identifier naming the interpretation rules for a content value.
///
/// Tags are opaque: extensions may register models beyond the built-in
/// ones, so this is a string newtype rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTag(Cow<'static, str>);

impl ModelTag {
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        match tag.as_str() {
            MODEL_WIKITEXT => Self::wikitext(),
            MODEL_JAVASCRIPT => Self::javascript(),
            MODEL_CSS => Self::css(),
            MODEL_TEXT => Self::text(),
            _ => Self(Cow::Owned(tag)),
        }
    }

    pub const fn wikitext() -> Self {
        Self::from_static(MODEL_WIKITEXT)
    }

    pub const fn javascript() -> Self {
        Self::from_static(MODEL_JAVASCRIPT)
    }

    pub const fn css() -> Self {
        Self::from_static(MODEL_CSS)
    }

    pub const fn text() -> Self {
        Self::from_static(MODEL_TEXT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
