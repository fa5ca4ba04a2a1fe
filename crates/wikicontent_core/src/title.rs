use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Special,
    Main,
    Talk,
    User,
    UserTalk,
    Project,
    File,
    MediaWiki,
    Template,
    Help,
    Category,
    Module,
}

impl Namespace {
    pub fn id(self) -> i32 {
        match self {
            Self::Special => -1,
            Self::Main => 0,
            Self::Talk => 1,
            Self::User => 2,
            Self::UserTalk => 3,
            Self::Project => 4,
            Self::File => 6,
            Self::MediaWiki => 8,
            Self::Template => 10,
            Self::Help => 12,
            Self::Category => 14,
            Self::Module => 828,
        }
    }

    /// Canonical prefix without the trailing colon; empty for the main namespace.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Special => "Special",
            Self::Main => "",
            Self::Talk => "Talk",
            Self::User => "User",
            Self::UserTalk => "User talk",
            Self::Project => "Project",
            Self::File => "File",
            Self::MediaWiki => "MediaWiki",
            Self::Template => "Template",
            Self::Help => "Help",
            Self::Category => "Category",
            Self::Module => "Module",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let normalized = normalize_spaces(&prefix.replace('_', " "));
        [
            Self::Special,
            Self::Talk,
            Self::User,
            Self::UserTalk,
            Self::Project,
            Self::File,
            Self::MediaWiki,
            Self::Template,
            Self::Help,
            Self::Category,
            Self::Module,
        ]
        .into_iter()
        .find(|namespace| namespace.as_str().eq_ignore_ascii_case(&normalized))
        .or_else(|| normalized.eq_ignore_ascii_case("Image").then_some(Self::File))
    }
}

/// Reference to a wiki page, optionally pointing at a fragment within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Title {
    namespace: Namespace,
    text: String,
    fragment: Option<String>,
}

impl Title {
    /// Builds a title in a known namespace, normalizing the page text.
    pub fn new(namespace: Namespace, text: &str) -> Self {
        Self {
            namespace,
            text: normalize_page_text(text),
            fragment: None,
        }
    }

    /// Parses prefixed text such as `Category:Foo bar#History`.
    ///
    /// Returns `None` for empty titles and titles containing characters
    /// that can never appear in a page name.
    pub fn parse(value: &str) -> Option<Self> {
        let mut value = value.trim();
        while let Some(stripped) = value.strip_prefix(':') {
            value = stripped.trim_start();
        }

        let (page, fragment) = match value.split_once('#') {
            Some((page, fragment)) => {
                let fragment = normalize_spaces(&fragment.replace('_', " "));
                (page, (!fragment.is_empty()).then_some(fragment))
            }
            None => (value, None),
        };

        if page.chars().any(is_illegal_title_char) {
            return None;
        }

        let (namespace, text) = match page.split_once(':') {
            Some((prefix, rest)) => match Namespace::from_prefix(prefix) {
                Some(namespace) => (namespace, rest),
                None => (Namespace::Main, page),
            },
            None => (Namespace::Main, page),
        };

        let text = normalize_page_text(text);
        if text.is_empty() {
            return None;
        }

        Some(Self {
            namespace,
            text,
            fragment,
        })
    }

    pub fn with_fragment(mut self, fragment: Option<&str>) -> Self {
        self.fragment = fragment
            .map(|value| normalize_spaces(&value.replace('_', " ")))
            .filter(|value| !value.is_empty());
        self
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn db_key(&self) -> String {
        self.text.replace(' ', "_")
    }

    pub fn prefixed_text(&self) -> String {
        match self.namespace {
            Namespace::Main => self.text.clone(),
            namespace => format!("{}:{}", namespace.as_str(), self.text),
        }
    }

    pub fn prefixed_db_key(&self) -> String {
        self.prefixed_text().replace(' ', "_")
    }

    /// Prefixed text including the `#fragment` suffix when present.
    pub fn full_text(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{fragment}", self.prefixed_text()),
            None => self.prefixed_text(),
        }
    }

    /// Same page, fragment dropped.
    pub fn page(&self) -> Self {
        Self {
            namespace: self.namespace,
            text: self.text.clone(),
            fragment: None,
        }
    }

    pub fn local_url(&self) -> String {
        let mut url = format!("/wiki/{}", self.prefixed_db_key());
        if let Some(fragment) = &self.fragment {
            url.push('#');
            url.push_str(&anchor_encode(fragment));
        }
        url
    }

    pub fn is_valid_redirect_target(&self) -> bool {
        self.namespace != Namespace::Special && !self.text.is_empty()
    }

    /// Whether the page name ends with the given suffix, e.g. `.js`.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.text.len() > suffix.len() && self.text.ends_with(suffix)
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_text())
    }
}

/// Encodes heading or fragment text the way section anchors are written.
pub fn anchor_encode(value: &str) -> String {
    normalize_spaces(value).replace(' ', "_")
}

fn is_illegal_title_char(ch: char) -> bool {
    matches!(ch, '<' | '>' | '[' | ']' | '{' | '}' | '|') || ch.is_control()
}

fn normalize_page_text(value: &str) -> String {
    let normalized = normalize_spaces(&value.replace('_', " "));
    let mut chars = normalized.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => normalized,
    }
}

pub(crate) fn normalize_spaces(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_was_space = false;

    for ch in value.chars() {
        if ch.is_whitespace() {
            if !previous_was_space {
                output.push(' ');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }

    output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_namespace_and_text() {
        let title = Title::parse("category:foo_bar").expect("title");
        assert_eq!(title.namespace(), Namespace::Category);
        assert_eq!(title.text(), "Foo bar");
        assert_eq!(title.prefixed_text(), "Category:Foo bar");
        assert_eq!(title.prefixed_db_key(), "Category:Foo_bar");
    }

    #[test]
    fn parse_keeps_unknown_prefix_in_main_namespace() {
        let title = Title::parse("Goldenlight: Story").expect("title");
        assert_eq!(title.namespace(), Namespace::Main);
        assert_eq!(title.text(), "Goldenlight: Story");
    }

    #[test]
    fn parse_splits_fragment() {
        let title = Title::parse(":Help:Editing#Section_two").expect("title");
        assert_eq!(title.namespace(), Namespace::Help);
        assert_eq!(title.fragment(), Some("Section two"));
        assert_eq!(title.full_text(), "Help:Editing#Section two");
        assert_eq!(title.local_url(), "/wiki/Help:Editing#Section_two");
        assert_eq!(title.page().fragment(), None);
    }

    #[test]
    fn parse_rejects_empty_and_illegal_titles() {
        assert!(Title::parse("").is_none());
        assert!(Title::parse("Category:").is_none());
        assert!(Title::parse("Foo|bar").is_none());
        assert!(Title::parse("A [b]").is_none());
    }

    #[test]
    fn special_pages_are_not_redirect_targets() {
        let special = Title::parse("Special:Random").expect("title");
        assert!(!special.is_valid_redirect_target());
        assert!(Title::new(Namespace::Main, "Alpha").is_valid_redirect_target());
    }

    #[test]
    fn user_talk_prefix_is_recognized_with_underscore() {
        let title = Title::parse("User_talk:Example").expect("title");
        assert_eq!(title.namespace(), Namespace::UserTalk);
        assert_eq!(title.prefixed_text(), "User talk:Example");
    }
}
