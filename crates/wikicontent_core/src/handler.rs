use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::content::{
    Content, ContentValue, CssContent, JavaScriptContent, TextContent, WikitextContent,
};
use crate::error::{ContentError, ContentResult, check_model};
use crate::model::{
    FORMAT_CSS, FORMAT_JAVASCRIPT, FORMAT_TEXT, FORMAT_WIKITEXT, ModelTag,
};
use crate::parser::make_redirect_text;
use crate::title::{Namespace, Title};

/// Per-model factory and serializer.
pub trait ContentHandler: Send + Sync + fmt::Debug {
    fn model(&self) -> &ModelTag;

    /// Supported formats; the first one is the default.
    fn supported_formats(&self) -> &[&'static str];

    fn default_format(&self) -> &'static str {
        self.supported_formats()
            .first()
            .copied()
            .unwrap_or(FORMAT_TEXT)
    }

    fn is_supported_format(&self, format: &str) -> bool {
        self.supported_formats().contains(&format)
    }

    fn check_format(&self, format: &str) -> ContentResult<()> {
        if self.is_supported_format(format) {
            Ok(())
        } else {
            Err(ContentError::UnsupportedFormat {
                model: self.model().clone(),
                format: format.to_string(),
            })
        }
    }

    fn serialize_content(&self, content: &Content, format: Option<&str>) -> ContentResult<String>;

    fn unserialize_content(&self, blob: &str, format: Option<&str>) -> ContentResult<Content>;

    fn make_empty_content(&self) -> Content;

    fn make_redirect_content(&self, _target: &Title) -> Option<Content> {
        None
    }

    fn supports_sections(&self) -> bool {
        false
    }

    fn supports_redirects(&self) -> bool {
        false
    }

    fn is_parser_cacheable(&self) -> bool {
        true
    }

    /// Whether contents of this model are plain text underneath, which
    /// makes them convertible to each other.
    fn is_text_based(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextFlavor {
    Plain,
    Wikitext,
    JavaScript,
    Css,
}

/// Handler for every model whose native data is a string.
#[derive(Debug, Clone)]
pub struct TextContentHandler {
    model: ModelTag,
    formats: &'static [&'static str],
    flavor: TextFlavor,
}

impl TextContentHandler {
    pub fn plain() -> Self {
        Self::custom(ModelTag::text())
    }

    /// Plain text content registered under a model tag of the caller's choice.
    pub fn custom(model: ModelTag) -> Self {
        Self {
            model,
            formats: &[FORMAT_TEXT],
            flavor: TextFlavor::Plain,
        }
    }

    pub fn wikitext() -> Self {
        Self {
            model: ModelTag::wikitext(),
            formats: &[FORMAT_WIKITEXT],
            flavor: TextFlavor::Wikitext,
        }
    }

    pub fn javascript() -> Self {
        Self {
            model: ModelTag::javascript(),
            formats: &[FORMAT_JAVASCRIPT],
            flavor: TextFlavor::JavaScript,
        }
    }

    pub fn css() -> Self {
        Self {
            model: ModelTag::css(),
            formats: &[FORMAT_CSS],
            flavor: TextFlavor::Css,
        }
    }

    fn build(&self, text: String) -> Content {
        match self.flavor {
            TextFlavor::Plain => TextContent::with_model(text, self.model.clone()).into(),
            TextFlavor::Wikitext => WikitextContent::new(text).into(),
            TextFlavor::JavaScript => JavaScriptContent::new(text).into(),
            TextFlavor::Css => CssContent::new(text).into(),
        }
    }
}

impl ContentHandler for TextContentHandler {
    fn model(&self) -> &ModelTag {
        &self.model
    }

    fn supported_formats(&self) -> &[&'static str] {
        self.formats
    }

    fn serialize_content(&self, content: &Content, format: Option<&str>) -> ContentResult<String> {
        check_model(&self.model, content.model())?;
        if let Some(format) = format {
            self.check_format(format)?;
        }
        Ok(content.native_data().into_owned())
    }

    fn unserialize_content(&self, blob: &str, format: Option<&str>) -> ContentResult<Content> {
        if let Some(format) = format {
            self.check_format(format)?;
        }
        Ok(self.build(blob.to_string()))
    }

    fn make_empty_content(&self) -> Content {
        self.build(String::new())
    }

    fn make_redirect_content(&self, target: &Title) -> Option<Content> {
        (self.flavor == TextFlavor::Wikitext && target.is_valid_redirect_target())
            .then(|| self.build(make_redirect_text(target)))
    }

    fn supports_sections(&self) -> bool {
        self.flavor == TextFlavor::Wikitext
    }

    fn supports_redirects(&self) -> bool {
        self.flavor == TextFlavor::Wikitext
    }

    fn is_text_based(&self) -> bool {
        true
    }
}

/// Model tag to handler table.
#[derive(Debug, Clone, Default)]
pub struct ContentHandlerRegistry {
    handlers: BTreeMap<ModelTag, Arc<dyn ContentHandler>>,
}

impl ContentHandlerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the wikitext, JavaScript, CSS and plain text handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TextContentHandler::wikitext()));
        registry.register(Arc::new(TextContentHandler::javascript()));
        registry.register(Arc::new(TextContentHandler::css()));
        registry.register(Arc::new(TextContentHandler::plain()));
        registry
    }

    /// Replaces any handler already registered for the same model.
    pub fn register(&mut self, handler: Arc<dyn ContentHandler>) -> &mut Self {
        self.handlers.insert(handler.model().clone(), handler);
        self
    }

    pub fn handler_for(&self, model: &ModelTag) -> ContentResult<Arc<dyn ContentHandler>> {
        self.handlers
            .get(model)
            .cloned()
            .ok_or_else(|| ContentError::UnknownModel {
                model: model.clone(),
            })
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelTag> {
        self.handlers.keys()
    }

    /// Model a new page gets from its title alone.
    pub fn default_model_for(&self, title: &Title) -> ModelTag {
        let script_page = match title.namespace() {
            Namespace::MediaWiki => true,
            Namespace::User => title.text().contains('/'),
            _ => false,
        };
        if script_page {
            if title.has_suffix(".js") {
                return ModelTag::javascript();
            }
            if title.has_suffix(".css") {
                return ModelTag::css();
            }
        }
        ModelTag::wikitext()
    }

    pub fn make_content(
        &self,
        text: &str,
        model: &ModelTag,
        format: Option<&str>,
    ) -> ContentResult<Content> {
        self.handler_for(model)?.unserialize_content(text, format)
    }

    pub fn make_redirect_content(&self, model: &ModelTag, target: &Title) -> Option<Content> {
        self.handler_for(model).ok()?.make_redirect_content(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_follows_namespace_and_suffix() {
        let registry = ContentHandlerRegistry::with_defaults();
        let model = |title: &str| {
            registry
                .default_model_for(&Title::parse(title).expect("title"))
                .as_str()
                .to_string()
        };
        assert_eq!(model("MediaWiki:Common.js"), "javascript");
        assert_eq!(model("MediaWiki:Common.css"), "css");
        assert_eq!(model("User:Alice/skin.css"), "css");
        assert_eq!(model("User:Alice.css"), "wikitext");
        assert_eq!(model("Main Page.js"), "wikitext");
        assert_eq!(model("MediaWiki:.js"), "wikitext");
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = ContentHandlerRegistry::with_defaults();
        let error = registry
            .handler_for(&ModelTag::new("json"))
            .expect_err("json is not registered");
        assert!(matches!(error, ContentError::UnknownModel { .. }));
    }

    #[test]
    fn serialize_checks_model_and_format() {
        let handler = TextContentHandler::javascript();
        let content = handler
            .unserialize_content("var x = 1;", Some(FORMAT_JAVASCRIPT))
            .expect("unserialize");
        assert_eq!(
            handler
                .serialize_content(&content, None)
                .expect("serialize"),
            "var x = 1;"
        );

        let format_error = handler
            .serialize_content(&content, Some(FORMAT_WIKITEXT))
            .expect_err("wikitext format is not javascript");
        assert!(matches!(format_error, ContentError::UnsupportedFormat { .. }));

        let wikitext = Content::wikitext("x");
        let model_error = handler
            .serialize_content(&wikitext, None)
            .expect_err("wrong model");
        assert!(matches!(model_error, ContentError::ModelMismatch { .. }));
    }

    #[test]
    fn only_wikitext_makes_redirects() {
        let registry = ContentHandlerRegistry::with_defaults();
        let target = Title::parse("Target page").expect("title");

        let redirect = registry
            .make_redirect_content(&ModelTag::wikitext(), &target)
            .expect("wikitext supports redirects");
        assert_eq!(redirect.native_data(), "#REDIRECT [[Target page]]");

        assert!(
            registry
                .make_redirect_content(&ModelTag::css(), &target)
                .is_none()
        );
        let special = Title::parse("Special:Random").expect("title");
        assert!(
            registry
                .make_redirect_content(&ModelTag::wikitext(), &special)
                .is_none()
        );
    }

    #[test]
    fn custom_text_models_keep_their_tag() {
        let mut registry = ContentHandlerRegistry::with_defaults();
        registry.register(Arc::new(TextContentHandler::custom(ModelTag::new(
            "sanitized-css",
        ))));
        let content = registry
            .make_content("a {}", &ModelTag::new("sanitized-css"), None)
            .expect("make content");
        assert_eq!(content.model().as_str(), "sanitized-css");
        assert!(registry.models().any(|model| model.as_str() == "sanitized-css"));
    }
}
