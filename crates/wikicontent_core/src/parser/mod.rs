//! Render collaborator: parses wikitext, splits sections, extracts redirects
//! and runs the save/preload substitution passes.

mod redirect;
mod render;
mod sections;
mod strip;
mod transform;

use std::fmt;

use chrono::Utc;

use crate::error::{ContentError, ContentResult};
use crate::language::Language;
use crate::options::{ParserOptions, User};
use crate::output::RenderOutput;
use crate::title::Title;

pub use redirect::make_redirect_text;
pub use sections::{HeadingLine, SectionId, parse_heading_line, scan_headings};
pub use transform::pipe_trick_label;

/// Default ceiling on input size, matching a 2 MiB article limit.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 2 * 1024 * 1024;

pub trait MarkupParser: Send + Sync + fmt::Debug {
    fn parse(
        &self,
        text: &str,
        title: &Title,
        options: &ParserOptions,
        revision_id: Option<u64>,
        generate_html: bool,
    ) -> ContentResult<RenderOutput>;

    /// `None` when the section does not exist.
    fn get_section(&self, text: &str, section: &SectionId) -> Option<String>;

    /// `None` when the section does not exist.
    fn replace_section(&self, text: &str, section: &SectionId, new_text: &str) -> Option<String>;

    fn pre_save_transform(
        &self,
        text: &str,
        title: &Title,
        user: &User,
        options: &ParserOptions,
        language: &dyn Language,
    ) -> String;

    fn preload_transform(
        &self,
        text: &str,
        title: &Title,
        options: &ParserOptions,
        params: &[String],
    ) -> String;

    fn redirect_target_and_text<'a>(&self, text: &'a str) -> Option<(Title, &'a str)>;

    fn redirect_target(&self, text: &str) -> Option<Title> {
        self.redirect_target_and_text(text).map(|(title, _)| title)
    }
}

#[derive(Debug, Clone)]
pub struct WikitextParser {
    max_input_bytes: usize,
}

impl WikitextParser {
    pub fn new() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }

    pub fn with_max_input_bytes(mut self, max_input_bytes: usize) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }
}

impl Default for WikitextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupParser for WikitextParser {
    fn parse(
        &self,
        text: &str,
        title: &Title,
        options: &ParserOptions,
        revision_id: Option<u64>,
        generate_html: bool,
    ) -> ContentResult<RenderOutput> {
        if text.len() > self.max_input_bytes {
            return Err(ContentError::render(format!(
                "{} is {} bytes, above the {} byte limit",
                title.prefixed_text(),
                text.len(),
                self.max_input_bytes
            )));
        }
        let mut output = RenderOutput::new();
        render::render_wikitext(text, title, options, generate_html, &mut output);
        output.set_revision_id(revision_id);
        output.set_cache_time(Utc::now().timestamp());
        Ok(output)
    }

    fn get_section(&self, text: &str, section: &SectionId) -> Option<String> {
        sections::extract_section(text, section)
    }

    fn replace_section(&self, text: &str, section: &SectionId, new_text: &str) -> Option<String> {
        sections::replace_section(text, section, new_text)
    }

    fn pre_save_transform(
        &self,
        text: &str,
        _title: &Title,
        user: &User,
        options: &ParserOptions,
        language: &dyn Language,
    ) -> String {
        transform::pre_save_transform(text, user, options, language)
    }

    fn preload_transform(
        &self,
        text: &str,
        title: &Title,
        options: &ParserOptions,
        params: &[String],
    ) -> String {
        transform::preload_transform(text, title, options, params)
    }

    fn redirect_target_and_text<'a>(&self, text: &'a str) -> Option<(Title, &'a str)> {
        redirect::redirect_target_and_text(text)
    }
}

pub fn escape_html(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            _ => output.push(ch),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::title::Namespace;

    #[test]
    fn parse_rejects_oversized_input() {
        let parser = WikitextParser::new().with_max_input_bytes(4);
        let title = Title::new(Namespace::Main, "Big");
        let options = ParserOptions::canonical(&ContentConfig::default());
        let error = parser
            .parse("12345", &title, &options, None, true)
            .expect_err("must fail");
        assert!(matches!(error, ContentError::Render { .. }));
    }

    #[test]
    fn parse_stamps_revision_and_wraps_output() {
        let parser = WikitextParser::new();
        let title = Title::new(Namespace::Main, "Small");
        let options = ParserOptions::canonical(&ContentConfig::default());
        let output = parser
            .parse("Hi", &title, &options, Some(7), true)
            .expect("parse");
        assert_eq!(output.revision_id(), Some(7));
        assert!(output.cache_time().is_some());
        assert_eq!(
            output.html(),
            Some("<div class=\"mw-parser-output\"><p>Hi\n</p>\n</div>")
        );
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
