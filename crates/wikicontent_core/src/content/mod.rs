//! Content values: the closed set of models and the operations they share.

mod message;
mod script;
mod text;
mod wikitext;

use std::borrow::Cow;
use std::ptr;

use tracing::debug;

pub use message::{MessageContent, MessageOption};
pub use script::{CssContent, JavaScriptContent};
pub use text::TextContent;
pub use wikitext::WikitextContent;

use crate::config::ArticleCountMethod;
use crate::diff::ContentDiff;
use crate::error::{ContentResult, check_model};
use crate::language::Language;
use crate::model::ModelTag;
use crate::options::{ParserOptions, User};
use crate::output::{RenderOutput, SecondaryDataUpdate};
use crate::parser::SectionId;
use crate::services::ContentServices;
use crate::title::Title;

/// Result of asking a content value for one of its sections.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionLookup {
    /// The model has no notion of sections.
    Unsupported,
    Missing,
    Found(Content),
}

impl SectionLookup {
    pub fn found(self) -> Option<Content> {
        match self {
            Self::Found(content) => Some(content),
            _ => None,
        }
    }
}

/// Capability set every content model provides.
///
/// Defaults describe the most conservative model: no redirects, no
/// sections, and transforms that return the value unchanged.
pub trait ContentValue: Clone + Into<Content> {
    fn model(&self) -> &ModelTag;

    fn native_data(&self) -> Cow<'_, str>;

    /// Size in bytes of the native data.
    fn size(&self) -> usize {
        self.native_data().len()
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn text_for_search_index(&self) -> String {
        self.native_data().into_owned()
    }

    /// Text to splice in when the page is transcluded; `None` if it cannot be.
    fn wikitext_for_transclusion(&self) -> Option<String> {
        Some(self.native_data().into_owned())
    }

    fn text_for_summary(&self, max_length: usize, services: &ContentServices) -> String {
        text::summary_text(&self.native_data(), max_length, services.language())
    }

    fn redirect_target(&self, _services: &ContentServices) -> Option<Title> {
        None
    }

    /// `has_links` may be supplied by callers that already rendered the page.
    fn is_countable(
        &self,
        _has_links: Option<bool>,
        services: &ContentServices,
    ) -> ContentResult<bool> {
        Ok(self.redirect_target(services).is_none()
            && services.config().article_count_method == ArticleCountMethod::Any)
    }

    /// Model-specific render without the alter-output hooks.
    fn fill_parser_output(
        &self,
        title: &Title,
        revision_id: Option<u64>,
        options: &ParserOptions,
        generate_html: bool,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput>;

    fn section(&self, _section: &SectionId, _services: &ContentServices) -> SectionLookup {
        SectionLookup::Unsupported
    }

    /// `Ok(None)` when the model does not support sections. Fails with
    /// [`ContentError::ModelMismatch`](crate::error::ContentError) when
    /// `with` carries another model tag.
    fn replace_section(
        &self,
        _section: &SectionId,
        with: &Content,
        _section_title: Option<&str>,
        _services: &ContentServices,
    ) -> ContentResult<Option<Content>> {
        check_model(self.model(), with.model())?;
        Ok(None)
    }

    fn add_section_header(&self, _header: &str, _services: &ContentServices) -> Content {
        self.clone().into()
    }

    fn pre_save_transform(
        &self,
        _title: &Title,
        _user: &User,
        _options: &ParserOptions,
        _services: &ContentServices,
    ) -> Content {
        self.clone().into()
    }

    fn preload_transform(
        &self,
        _title: &Title,
        _options: &ParserOptions,
        _params: &[String],
        _services: &ContentServices,
    ) -> Content {
        self.clone().into()
    }
}

/// Optional capability of models whose value is a string of text.
pub trait TextBacked {
    fn text(&self) -> Cow<'_, str>;

    /// HTML produced by the model itself, bypassing the parser.
    fn html(&self, services: &ContentServices) -> ContentResult<String>;
}

/// An immutable content value of one of the known models.
#[derive(Debug, Clone)]
pub enum Content {
    Text(TextContent),
    Wikitext(WikitextContent),
    JavaScript(JavaScriptContent),
    Css(CssContent),
    Message(MessageContent),
}

macro_rules! dispatch {
    ($content:expr, $inner:ident => $body:expr) => {
        match $content {
            Content::Text($inner) => $body,
            Content::Wikitext($inner) => $body,
            Content::JavaScript($inner) => $body,
            Content::Css($inner) => $body,
            Content::Message($inner) => $body,
        }
    };
}

impl From<TextContent> for Content {
    fn from(value: TextContent) -> Self {
        Self::Text(value)
    }
}

impl From<WikitextContent> for Content {
    fn from(value: WikitextContent) -> Self {
        Self::Wikitext(value)
    }
}

impl From<JavaScriptContent> for Content {
    fn from(value: JavaScriptContent) -> Self {
        Self::JavaScript(value)
    }
}

impl From<CssContent> for Content {
    fn from(value: CssContent) -> Self {
        Self::Css(value)
    }
}

impl From<MessageContent> for Content {
    fn from(value: MessageContent) -> Self {
        Self::Message(value)
    }
}

impl ContentValue for Content {
    fn model(&self) -> &ModelTag {
        dispatch!(self, inner => inner.model())
    }

    fn native_data(&self) -> Cow<'_, str> {
        dispatch!(self, inner => inner.native_data())
    }

    fn size(&self) -> usize {
        dispatch!(self, inner => inner.size())
    }

    fn is_empty(&self) -> bool {
        dispatch!(self, inner => inner.is_empty())
    }

    fn is_valid(&self) -> bool {
        dispatch!(self, inner => inner.is_valid())
    }

    fn text_for_search_index(&self) -> String {
        dispatch!(self, inner => inner.text_for_search_index())
    }

    fn wikitext_for_transclusion(&self) -> Option<String> {
        dispatch!(self, inner => inner.wikitext_for_transclusion())
    }

    fn text_for_summary(&self, max_length: usize, services: &ContentServices) -> String {
        dispatch!(self, inner => inner.text_for_summary(max_length, services))
    }

    fn redirect_target(&self, services: &ContentServices) -> Option<Title> {
        dispatch!(self, inner => inner.redirect_target(services))
    }

    fn is_countable(
        &self,
        has_links: Option<bool>,
        services: &ContentServices,
    ) -> ContentResult<bool> {
        dispatch!(self, inner => inner.is_countable(has_links, services))
    }

    fn fill_parser_output(
        &self,
        title: &Title,
        revision_id: Option<u64>,
        options: &ParserOptions,
        generate_html: bool,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput> {
        dispatch!(self, inner => inner.fill_parser_output(title, revision_id, options, generate_html, services))
    }

    fn section(&self, section: &SectionId, services: &ContentServices) -> SectionLookup {
        dispatch!(self, inner => inner.section(section, services))
    }

    /// Fails with a model mismatch before anything else when `with` is of
    /// another model.
    fn replace_section(
        &self,
        section: &SectionId,
        with: &Content,
        section_title: Option<&str>,
        services: &ContentServices,
    ) -> ContentResult<Option<Content>> {
        dispatch!(self, inner => inner.replace_section(section, with, section_title, services))
    }

    fn add_section_header(&self, header: &str, services: &ContentServices) -> Content {
        dispatch!(self, inner => inner.add_section_header(header, services))
    }

    fn pre_save_transform(
        &self,
        title: &Title,
        user: &User,
        options: &ParserOptions,
        services: &ContentServices,
    ) -> Content {
        dispatch!(self, inner => inner.pre_save_transform(title, user, options, services))
    }

    fn preload_transform(
        &self,
        title: &Title,
        options: &ParserOptions,
        params: &[String],
        services: &ContentServices,
    ) -> Content {
        dispatch!(self, inner => inner.preload_transform(title, options, params, services))
    }
}

impl Content {
    pub fn wikitext(text: impl Into<String>) -> Self {
        WikitextContent::new(text).into()
    }

    pub fn javascript(source: impl Into<String>) -> Self {
        JavaScriptContent::new(source).into()
    }

    pub fn css(source: impl Into<String>) -> Self {
        CssContent::new(source).into()
    }

    pub fn text(text: impl Into<String>) -> Self {
        TextContent::new(text).into()
    }

    /// Every built-in variant stores its body as text.
    pub fn as_text_backed(&self) -> &dyn TextBacked {
        dispatch!(self, inner => inner as &dyn TextBacked)
    }

    /// Same model and same native data. Identity short-circuits.
    pub fn equals(&self, other: Option<&Content>) -> bool {
        let Some(other) = other else {
            return false;
        };
        if ptr::eq(self, other) {
            return true;
        }
        self.model() == other.model() && self.native_data() == other.native_data()
    }

    /// Values are immutable, so a copy is an equal clone.
    pub fn copy(&self) -> Content {
        self.clone()
    }

    /// Renders for `title`, using the memoized canonical options when none
    /// are given, then runs the alter-output hooks.
    pub fn parser_output(
        &self,
        title: &Title,
        revision_id: Option<u64>,
        options: Option<&ParserOptions>,
        generate_html: bool,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput> {
        let defaults;
        let options = match options {
            Some(options) => options,
            None => {
                defaults = services.default_parser_options();
                defaults.as_ref()
            }
        };
        let mut output =
            self.fill_parser_output(title, revision_id, options, generate_html, services)?;
        services.hooks().alter_output(self, title, &mut output);
        Ok(output)
    }

    /// Updates to run after saving this content as `title`. The text
    /// models derive them from a render without HTML and ignore `previous`.
    pub fn secondary_data_updates(
        &self,
        title: &Title,
        _previous: Option<&Content>,
        recursive: bool,
        services: &ContentServices,
    ) -> ContentResult<Vec<SecondaryDataUpdate>> {
        let output = self.parser_output(title, None, None, false, services)?;
        Ok(output.secondary_data_updates(title, recursive))
    }

    pub fn deletion_updates(&self, title: &Title) -> Vec<SecondaryDataUpdate> {
        vec![SecondaryDataUpdate::LinksDeletion {
            title: title.page(),
        }]
    }

    pub fn is_redirect(&self, services: &ContentServices) -> bool {
        self.redirect_target(services).is_some()
    }

    /// Redirect targets followed through the page store, at most
    /// `max_redirects` hops and never revisiting a page.
    pub fn redirect_chain(&self, services: &ContentServices) -> Option<Vec<Title>> {
        let first = self.redirect_target(services)?;
        let mut chain = vec![first];
        let hops = services.config().max_redirects.max(1);

        while chain.len() < hops {
            let Some(current) = chain.last() else {
                break;
            };
            if !current.is_valid_redirect_target() {
                break;
            }
            let Some(next) = services
                .pages()
                .latest_content(current)
                .and_then(|content| content.redirect_target(services))
            else {
                break;
            };
            if !next.is_valid_redirect_target() {
                break;
            }
            if chain.iter().any(|seen| seen.page() == next.page()) {
                debug!(page = %next, "redirect loop detected");
                break;
            }
            chain.push(next);
        }
        Some(chain)
    }

    pub fn ultimate_redirect_target(&self, services: &ContentServices) -> Option<Title> {
        self.redirect_chain(services)?.pop()
    }

    /// Line diff from `self` to `other`, segmented by `language` or the
    /// content language.
    pub fn diff(
        &self,
        other: &Content,
        language: Option<&dyn Language>,
        services: &ContentServices,
    ) -> ContentResult<ContentDiff> {
        check_model(self.model(), other.model())?;
        let language = language.unwrap_or_else(|| services.language());
        let old = self.native_data();
        let new = other.native_data();
        Ok(ContentDiff::between(
            &language.segment_for_diff(&old),
            &language.segment_for_diff(&new),
        ))
    }

    pub fn serialize(&self, format: Option<&str>, services: &ContentServices) -> ContentResult<String> {
        services
            .registry()
            .handler_for(self.model())?
            .serialize_content(self, format)
    }

    pub fn check_format(&self, format: &str, services: &ContentServices) -> ContentResult<()> {
        services
            .registry()
            .handler_for(self.model())?
            .check_format(format)
    }

    /// Converts between text-based models; `None` when no lossless
    /// conversion exists.
    pub fn convert(&self, to_model: &ModelTag, services: &ContentServices) -> Option<Content> {
        if self.model() == to_model {
            return Some(self.clone());
        }
        let handler = services.registry().handler_for(to_model).ok()?;
        if !handler.is_text_based() {
            return None;
        }
        let text = text::normalize_line_endings(&self.native_data());
        handler.unserialize_content(&text, None).ok()
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        self.equals(Some(other))
    }
}

impl Eq for Content {}
