use std::borrow::Cow;
use std::sync::Arc;

use super::text;
use super::{ContentValue, TextBacked};
use crate::error::ContentResult;
use crate::language::Language;
use crate::model::ModelTag;
use crate::options::ParserOptions;
use crate::output::RenderOutput;
use crate::parser::escape_html;
use crate::services::ContentServices;
use crate::title::{Namespace, Title};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOption {
    Parse,
    ParseInline,
    Escape,
}

/// Content backed by a localized interface message.
///
/// The model tag is always wikitext, but the value is rendered like plain
/// text content: no redirects and no sections.
#[derive(Debug, Clone)]
pub struct MessageContent {
    key: String,
    params: Vec<String>,
    options: Vec<MessageOption>,
    language: Arc<dyn Language>,
    model: ModelTag,
}

impl MessageContent {
    pub fn new(key: impl Into<String>, language: Arc<dyn Language>) -> Self {
        Self {
            key: key.into(),
            params: Vec::new(),
            options: Vec::new(),
            language,
            model: ModelTag::wikitext(),
        }
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_options(mut self, options: &[MessageOption]) -> Self {
        self.options = options.to_vec();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn options(&self) -> &[MessageOption] {
        &self.options
    }

    fn has_option(&self, option: MessageOption) -> bool {
        self.options.contains(&option)
    }

    /// Message text with params substituted; missing keys show as `<key>`.
    fn raw_text(&self) -> String {
        self.language
            .message(&self.key, &self.params)
            .unwrap_or_else(|| format!("<{}>", self.key))
    }

    /// Native text. Parse options are ignored here; escaping is not.
    pub fn text(&self) -> String {
        let raw = self.raw_text();
        if self.has_option(MessageOption::Escape) {
            escape_html(&raw)
        } else {
            raw
        }
    }
}

impl TextBacked for MessageContent {
    fn text(&self) -> Cow<'_, str> {
        Cow::Owned(MessageContent::text(self))
    }

    /// Always parsed; `ParseInline` drops the paragraph wrapper.
    fn html(&self, services: &ContentServices) -> ContentResult<String> {
        if self.has_option(MessageOption::Escape) {
            return Ok(escape_html(&self.raw_text()));
        }
        let title = Title::new(Namespace::MediaWiki, &self.key);
        let mut options = ParserOptions::canonical(services.config());
        options.interface_message = true;
        options.wrapper_class = None;
        options.user_language = self.language.code().to_string();

        let output = services
            .parser()
            .parse(&self.raw_text(), &title, &options, None, true)?;
        let html = output.html().unwrap_or_default();
        if self.has_option(MessageOption::ParseInline) {
            Ok(strip_paragraph(html).to_string())
        } else {
            Ok(html.to_string())
        }
    }
}

impl ContentValue for MessageContent {
    fn model(&self) -> &ModelTag {
        &self.model
    }

    fn native_data(&self) -> Cow<'_, str> {
        Cow::Owned(self.text())
    }

    fn fill_parser_output(
        &self,
        title: &Title,
        revision_id: Option<u64>,
        options: &ParserOptions,
        generate_html: bool,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput> {
        text::text_parser_output(
            &self.model,
            &self.text(),
            title,
            revision_id,
            options,
            generate_html,
            services,
            || self.html(services),
        )
    }
}

fn strip_paragraph(html: &str) -> &str {
    let trimmed = html.trim();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|inner| inner.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner.trim(),
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ContentLanguage;

    fn language() -> Arc<dyn Language> {
        Arc::new(
            ContentLanguage::default()
                .with_message("greeting", "Hello '''$1'''")
                .with_message("markup", "<b>&</b>"),
        )
    }

    #[test]
    fn native_text_substitutes_params() {
        let message =
            MessageContent::new("greeting", language()).with_params(vec!["Alice".to_string()]);
        assert_eq!(message.native_data(), "Hello '''Alice'''");
        assert_eq!(message.model().as_str(), "wikitext");
        assert_eq!(message.size(), "Hello '''Alice'''".len());
    }

    #[test]
    fn html_is_parsed_and_inline_option_drops_paragraph() {
        let services = ContentServices::default();
        let message =
            MessageContent::new("greeting", language()).with_params(vec!["Bob".to_string()]);
        assert_eq!(
            message.html(&services).expect("html"),
            "<p>Hello <b>Bob</b>\n</p>\n"
        );

        let inline = message.with_options(&[MessageOption::ParseInline]);
        assert_eq!(inline.html(&services).expect("html"), "Hello <b>Bob</b>");
    }

    #[test]
    fn escape_option_applies_to_text_and_html() {
        let services = ContentServices::default();
        let message =
            MessageContent::new("markup", language()).with_options(&[MessageOption::Escape]);
        assert_eq!(message.native_data(), "&lt;b&gt;&amp;&lt;/b&gt;");
        assert_eq!(
            message.html(&services).expect("html"),
            "&lt;b&gt;&amp;&lt;/b&gt;"
        );
    }

    #[test]
    fn missing_message_shows_key() {
        let message = MessageContent::new("nonexistent-key", language());
        assert_eq!(message.native_data(), "<nonexistent-key>");
    }

    #[test]
    fn messages_are_never_redirects() {
        let services = ContentServices::default();
        let language: Arc<dyn Language> =
            Arc::new(ContentLanguage::default().with_message("redir", "#REDIRECT [[Target]]"));
        let message = MessageContent::new("redir", language);
        assert!(message.redirect_target(&services).is_none());
    }
}
