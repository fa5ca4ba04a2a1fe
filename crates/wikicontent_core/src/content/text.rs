use std::borrow::Cow;

use super::{Content, ContentValue, TextBacked};
use crate::error::ContentResult;
use crate::language::Language;
use crate::model::ModelTag;
use crate::options::{ParserOptions, User};
use crate::output::RenderOutput;
use crate::parser::escape_html;
use crate::services::ContentServices;
use crate::title::Title;

/// Plain text content, also the base the other text models wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    model: ModelTag,
    text: String,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_model(text, ModelTag::text())
    }

    pub fn with_model(text: impl Into<String>, model: ModelTag) -> Self {
        Self {
            model,
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl TextBacked for TextContent {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }

    fn html(&self, _services: &ContentServices) -> ContentResult<String> {
        Ok(escape_html(&self.text))
    }
}

impl ContentValue for TextContent {
    fn model(&self) -> &ModelTag {
        &self.model
    }

    fn native_data(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }

    fn fill_parser_output(
        &self,
        title: &Title,
        revision_id: Option<u64>,
        options: &ParserOptions,
        generate_html: bool,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput> {
        text_parser_output(
            &self.model,
            &self.text,
            title,
            revision_id,
            options,
            generate_html,
            services,
            || self.html(services),
        )
    }

    fn pre_save_transform(
        &self,
        _title: &Title,
        _user: &User,
        _options: &ParserOptions,
        _services: &ContentServices,
    ) -> Content {
        let normalized = normalize_line_endings(&self.text);
        let transformed = normalized.trim_end();
        if transformed == self.text {
            return self.clone().into();
        }
        Self::with_model(transformed, self.model.clone()).into()
    }
}

pub(crate) fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Single-line summary cut to `max_length` bytes in `language`.
pub(crate) fn summary_text(text: &str, max_length: usize, language: &dyn Language) -> String {
    let flattened = text.replace(['\n', '\r'], " ");
    language.truncate(&flattened, max_length)
}

/// Shared render path: link metadata from the parser when the model is
/// configured for parsing, HTML from the model's own renderer.
#[allow(clippy::too_many_arguments)]
pub(crate) fn text_parser_output(
    model: &ModelTag,
    text: &str,
    title: &Title,
    revision_id: Option<u64>,
    options: &ParserOptions,
    generate_html: bool,
    services: &ContentServices,
    html: impl FnOnce() -> ContentResult<String>,
) -> ContentResult<RenderOutput> {
    let mut output = if services.config().parses_text_model(model) {
        services
            .parser()
            .parse(text, title, options, revision_id, false)?
    } else {
        let mut output = RenderOutput::new();
        output.set_revision_id(revision_id);
        output
    };
    if generate_html {
        output.set_html(Some(html()?));
    }
    Ok(output)
}
