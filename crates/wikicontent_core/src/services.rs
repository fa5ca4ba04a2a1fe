use std::sync::Arc;

use crate::config::ContentConfig;
use crate::handler::ContentHandlerRegistry;
use crate::hooks::ContentHooks;
use crate::language::{ContentLanguage, Language};
use crate::options::{DefaultOptions, ParserOptions};
use crate::pages::{MemoryPageStore, PageStore};
use crate::parser::{MarkupParser, WikitextParser};

/// Collaborators every content operation may consult.
#[derive(Debug, Clone)]
pub struct ContentServices {
    config: ContentConfig,
    language: Arc<dyn Language>,
    parser: Arc<dyn MarkupParser>,
    registry: Arc<ContentHandlerRegistry>,
    pages: Arc<dyn PageStore>,
    hooks: Arc<ContentHooks>,
    default_options: Arc<DefaultOptions>,
}

impl ContentServices {
    pub fn new(config: ContentConfig) -> Self {
        let language = ContentLanguage::new(config.content_language.clone());
        Self {
            config,
            language: Arc::new(language),
            parser: Arc::new(WikitextParser::new()),
            registry: Arc::new(ContentHandlerRegistry::with_defaults()),
            pages: Arc::new(MemoryPageStore::new()),
            hooks: Arc::new(ContentHooks::new()),
            default_options: Arc::new(DefaultOptions::new()),
        }
    }

    pub fn with_language(mut self, language: Arc<dyn Language>) -> Self {
        self.language = language;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn MarkupParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_registry(mut self, registry: ContentHandlerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_pages(mut self, pages: Arc<dyn PageStore>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_hooks(mut self, hooks: ContentHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn language(&self) -> &dyn Language {
        self.language.as_ref()
    }

    pub fn language_handle(&self) -> Arc<dyn Language> {
        Arc::clone(&self.language)
    }

    pub fn parser(&self) -> &dyn MarkupParser {
        self.parser.as_ref()
    }

    pub fn registry(&self) -> &ContentHandlerRegistry {
        &self.registry
    }

    pub fn pages(&self) -> &dyn PageStore {
        self.pages.as_ref()
    }

    pub fn hooks(&self) -> &ContentHooks {
        &self.hooks
    }

    pub(crate) fn hooks_handle(&self) -> Arc<ContentHooks> {
        Arc::clone(&self.hooks)
    }

    /// Canonical options, computed on first use and shared afterwards.
    pub fn default_parser_options(&self) -> Arc<ParserOptions> {
        self.default_options.get(&self.config)
    }

    pub fn reset_default_parser_options(&self) {
        self.default_options.reset();
    }
}

impl Default for ContentServices {
    fn default() -> Self {
        Self::new(ContentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArticleCountMethod;

    #[test]
    fn default_options_are_memoized_until_reset() {
        let services = ContentServices::default();
        let first = services.default_parser_options();
        let second = services.default_parser_options();
        assert!(Arc::ptr_eq(&first, &second));

        services.reset_default_parser_options();
        let third = services.default_parser_options();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    #[test]
    fn clones_share_the_memo() {
        let services = ContentServices::default();
        let copy = services.clone();
        let first = services.default_parser_options();
        assert!(Arc::ptr_eq(&first, &copy.default_parser_options()));
    }

    #[test]
    fn language_follows_config() {
        let mut config = ContentConfig::default().with_count_method(ArticleCountMethod::Any);
        config.content_language = "de".to_string();
        let services = ContentServices::new(config);
        assert_eq!(services.language().code(), "de");
        assert_eq!(
            services.config().article_count_method,
            ArticleCountMethod::Any
        );
    }
}
