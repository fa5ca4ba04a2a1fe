use std::borrow::Cow;

use tracing::debug;

use super::text::{self, TextContent};
use super::{Content, ContentValue, SectionLookup, TextBacked};
use crate::config::ArticleCountMethod;
use crate::error::{ContentError, ContentResult, check_model};
use crate::hooks::NewSection;
use crate::language::{Language, MSG_ELLIPSIS, MSG_NEW_SECTION_HEADER, MSG_REDIRECT_TO};
use crate::model::ModelTag;
use crate::options::{ParserOptions, User};
use crate::output::RenderOutput;
use crate::parser::{SectionId, escape_html};
use crate::services::ContentServices;
use crate::title::{Namespace, Title};

pub(crate) const REDIRECT_MODULE_STYLE: &str = "mediawiki.action.view.redirectPage";

/// Wiki markup: the model with redirects, sections and link-based counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikitextContent(TextContent);

impl WikitextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_model(text, ModelTag::wikitext())
    }

    pub(crate) fn with_model(text: impl Into<String>, model: ModelTag) -> Self {
        Self(TextContent::with_model(text, model))
    }

    pub fn text(&self) -> &str {
        self.0.text()
    }

    fn derive(&self, text: impl Into<String>) -> Content {
        Self::with_model(text, self.0.model().clone()).into()
    }

    fn section_header(services: &ContentServices, header: &str) -> String {
        services
            .language()
            .message(MSG_NEW_SECTION_HEADER, &[header.to_string()])
            .unwrap_or_else(|| format!("== {header} =="))
    }
}

impl TextBacked for WikitextContent {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0.text())
    }

    /// Wikitext must go through [`ContentValue::fill_parser_output`] so that
    /// redirects and link metadata are handled.
    fn html(&self, _services: &ContentServices) -> ContentResult<String> {
        Err(ContentError::NoDirectHtml {
            model: self.0.model().clone(),
        })
    }
}

impl ContentValue for WikitextContent {
    fn model(&self) -> &ModelTag {
        self.0.model()
    }

    fn native_data(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0.text())
    }

    fn text_for_summary(&self, max_length: usize, services: &ContentServices) -> String {
        let language = services.language();
        let summary = text::summary_text(self.text(), max_length, language);
        if self.text().len() <= max_length {
            return drop_dangling_link(&summary).to_string();
        }
        let ellipsis = language
            .message(MSG_ELLIPSIS, &[])
            .unwrap_or_else(|| "...".to_string());
        match summary.strip_suffix(ellipsis.as_str()) {
            Some(body) => {
                let kept = drop_dangling_link(body);
                if kept.len() == body.len() {
                    summary
                } else {
                    format!("{kept}{ellipsis}")
                }
            }
            None => drop_dangling_link(&summary).to_string(),
        }
    }

    fn redirect_target(&self, services: &ContentServices) -> Option<Title> {
        services.parser().redirect_target(self.text())
    }

    fn is_countable(
        &self,
        has_links: Option<bool>,
        services: &ContentServices,
    ) -> ContentResult<bool> {
        if self.redirect_target(services).is_some() {
            return Ok(false);
        }
        match services.config().article_count_method {
            ArticleCountMethod::Any => Ok(true),
            ArticleCountMethod::Comma => Ok(self.text().contains(',')),
            ArticleCountMethod::Link => match has_links {
                Some(has_links) => Ok(has_links),
                None => {
                    let probe = Title::new(Namespace::Main, "Dummy");
                    let options = services.default_parser_options();
                    let output = self.fill_parser_output(&probe, None, &options, false, services)?;
                    Ok(output.has_links())
                }
            },
        }
    }

    fn fill_parser_output(
        &self,
        title: &Title,
        revision_id: Option<u64>,
        options: &ParserOptions,
        generate_html: bool,
        services: &ContentServices,
    ) -> ContentResult<RenderOutput> {
        let parser = services.parser();
        let (body, redirect) = match parser.redirect_target_and_text(self.text()) {
            Some((target, rest)) => (rest, Some(target)),
            None => (self.text(), None),
        };

        let mut output = parser.parse(body, title, options, revision_id, generate_html)?;
        if let Some(target) = redirect {
            output.add_link(&target);
            if generate_html {
                let html = format!(
                    "{}{}",
                    redirect_header(&target, services.language()),
                    output.html().unwrap_or_default()
                );
                output.set_html(Some(html));
                output.add_module_style(REDIRECT_MODULE_STYLE);
            }
            output.set_redirect_target(Some(target));
        }
        Ok(output)
    }

    fn section(&self, section: &SectionId, services: &ContentServices) -> SectionLookup {
        match services.parser().get_section(self.text(), section) {
            Some(text) => SectionLookup::Found(self.derive(text)),
            None => SectionLookup::Missing,
        }
    }

    fn replace_section(
        &self,
        section: &SectionId,
        with: &Content,
        section_title: Option<&str>,
        services: &ContentServices,
    ) -> ContentResult<Option<Content>> {
        check_model(self.model(), with.model())?;
        let body = with.native_data();
        match section {
            SectionId::All => Ok(Some(with.clone())),
            SectionId::New => {
                let subject = section_title
                    .map(str::trim)
                    .filter(|subject| !subject.is_empty())
                    .map(|subject| format!("{}\n\n", Self::section_header(services, subject)))
                    .unwrap_or_default();
                let existing = self.text();
                let placed = services.hooks().place_new_section(&NewSection {
                    existing,
                    subject: &subject,
                    body: &body,
                });
                let text = placed.unwrap_or_else(|| {
                    if existing.trim().is_empty() {
                        format!("{subject}{body}")
                    } else {
                        format!("{existing}\n\n{subject}{body}")
                    }
                });
                Ok(Some(self.derive(text)))
            }
            _ => match services.parser().replace_section(self.text(), section, &body) {
                Some(text) => Ok(Some(self.derive(text))),
                None => {
                    debug!(%section, "section not found, leaving content unchanged");
                    Ok(Some(self.clone().into()))
                }
            },
        }
    }

    fn add_section_header(&self, header: &str, services: &ContentServices) -> Content {
        let heading = Self::section_header(services, header);
        self.derive(format!("{heading}\n\n{}", self.text()))
    }

    fn pre_save_transform(
        &self,
        title: &Title,
        user: &User,
        options: &ParserOptions,
        services: &ContentServices,
    ) -> Content {
        let transformed = services.parser().pre_save_transform(
            self.text(),
            title,
            user,
            options,
            services.language(),
        );
        if transformed == self.text() {
            return self.clone().into();
        }
        self.derive(transformed)
    }

    fn preload_transform(
        &self,
        title: &Title,
        options: &ParserOptions,
        params: &[String],
        services: &ContentServices,
    ) -> Content {
        let transformed = services
            .parser()
            .preload_transform(self.text(), title, options, params);
        self.derive(transformed)
    }
}

fn redirect_header(target: &Title, language: &dyn Language) -> String {
    let label = language
        .message(MSG_REDIRECT_TO, &[])
        .unwrap_or_else(|| "Redirect to:".to_string());
    format!(
        "<div class=\"redirectMsg\"><p>{}</p><ul class=\"redirectText\"><li><a href=\"{}\" title=\"{}\">{}</a></li></ul></div>",
        escape_html(&label),
        escape_html(&target.local_url()),
        escape_html(&target.prefixed_text()),
        escape_html(&target.full_text()),
    )
}

/// Cuts a summary before an opening `[[` that never closes.
fn drop_dangling_link(summary: &str) -> &str {
    match summary.rfind("[[") {
        Some(open) if !summary[open..].contains("]]") => summary[..open].trim_end(),
        _ => summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::hooks::ContentHooks;

    fn services_with(method: ArticleCountMethod) -> ContentServices {
        ContentServices::new(ContentConfig::default().with_count_method(method))
    }

    fn page() -> Title {
        Title::new(Namespace::Main, "Sample")
    }

    #[test]
    fn redirect_render_adds_header_link_and_style() {
        let services = ContentServices::default();
        let content = WikitextContent::new("#REDIRECT [[Target page#Part]]\nleftover");
        let output = content
            .fill_parser_output(
                &page(),
                None,
                &services.default_parser_options(),
                true,
                &services,
            )
            .expect("render");

        let html = output.html().expect("html");
        assert!(html.starts_with("<div class=\"redirectMsg\"><p>Redirect to:</p>"));
        assert!(html.contains("href=\"/wiki/Target_page#Part\""));
        assert!(html.contains("leftover"));
        assert!(!html.contains("#REDIRECT"));
        assert!(output.links().contains(&Title::new(Namespace::Main, "Target page")));
        assert!(output.module_styles().contains(REDIRECT_MODULE_STYLE));
        assert_eq!(
            output.redirect_target().map(Title::full_text).as_deref(),
            Some("Target page#Part")
        );
    }

    #[test]
    fn redirect_without_html_still_records_link() {
        let services = ContentServices::default();
        let content = WikitextContent::new("#REDIRECT [[Target]]");
        let output = content
            .fill_parser_output(
                &page(),
                None,
                &services.default_parser_options(),
                false,
                &services,
            )
            .expect("render");
        assert_eq!(output.html(), None);
        assert!(output.has_links());
        assert!(output.module_styles().is_empty());
    }

    #[test]
    fn direct_html_is_refused() {
        let services = ContentServices::default();
        let error = WikitextContent::new("x")
            .html(&services)
            .expect_err("wikitext renders through parser output");
        assert!(matches!(error, ContentError::NoDirectHtml { .. }));
    }

    #[test]
    fn countability_follows_configured_method() {
        let plain = WikitextContent::new("Plain text without links");
        let comma = WikitextContent::new("One, two");
        let linked = WikitextContent::new("See [[Alpha]]");
        let redirect = WikitextContent::new("#REDIRECT [[Alpha]]");

        let any = services_with(ArticleCountMethod::Any);
        assert!(plain.is_countable(None, &any).expect("any"));
        assert!(!redirect.is_countable(None, &any).expect("redirect"));

        let by_comma = services_with(ArticleCountMethod::Comma);
        assert!(comma.is_countable(None, &by_comma).expect("comma"));
        assert!(!plain.is_countable(None, &by_comma).expect("comma"));

        let by_link = services_with(ArticleCountMethod::Link);
        assert!(linked.is_countable(None, &by_link).expect("link"));
        assert!(!plain.is_countable(None, &by_link).expect("link"));
        assert!(plain.is_countable(Some(true), &by_link).expect("hint"));
    }

    #[test]
    fn summary_drops_unclosed_link() {
        let services = ContentServices::default();
        let content = WikitextContent::new("Hello [[Unfinished");
        assert_eq!(content.text_for_summary(20, &services), "Hello");

        let closed = WikitextContent::new("Hello [[World]]");
        assert_eq!(closed.text_for_summary(20, &services), "Hello [[World]]");
    }

    #[test]
    fn summary_keeps_ellipsis_when_truncation_opens_a_link() {
        let services = ContentServices::default();
        let cut = WikitextContent::new("Hello [[World is long]]");
        assert_eq!(cut.text_for_summary(20, &services), "Hello...");

        let intact = WikitextContent::new("Hello [[World]] and more text");
        assert_eq!(intact.text_for_summary(20, &services), "Hello [[World]] a...");
    }

    #[test]
    fn section_lookup_distinguishes_missing() {
        let services = ContentServices::default();
        let content = WikitextContent::new("Intro\n== A ==\nalpha\n== B ==\nbeta");
        match content.section(&SectionId::Index(2), &services) {
            SectionLookup::Found(section) => assert_eq!(section.native_data(), "== B ==\nbeta"),
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert!(matches!(
            content.section(&SectionId::Index(9), &services),
            SectionLookup::Missing
        ));
    }

    #[test]
    fn unclosed_marker_line_stays_inside_section() {
        let services = ContentServices::default();
        let content = WikitextContent::new("Intro\n== A ==\nalpha\n=x\nstill alpha");
        match content.section(&SectionId::Index(1), &services) {
            SectionLookup::Found(section) => {
                assert_eq!(section.native_data(), "== A ==\nalpha\n=x\nstill alpha")
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert!(matches!(
            content.section(&SectionId::Index(2), &services),
            SectionLookup::Missing
        ));
    }

    #[test]
    fn replace_section_checks_replacement_model() {
        let services = ContentServices::default();
        let content = WikitextContent::new("x");
        for section in [SectionId::All, SectionId::New, SectionId::Index(0)] {
            let error = content
                .replace_section(&section, &Content::javascript("y"), None, &services)
                .expect_err("javascript into wikitext");
            assert!(matches!(error, ContentError::ModelMismatch { .. }));
        }
    }

    #[test]
    fn new_section_appends_with_heading() {
        let services = ContentServices::default();
        let content = WikitextContent::new("Existing text");
        let replaced = content
            .replace_section(
                &SectionId::New,
                &Content::wikitext("Body"),
                Some("Topic"),
                &services,
            )
            .expect("replace")
            .expect("supported");
        assert_eq!(replaced.native_data(), "Existing text\n\n== Topic ==\n\nBody");

        let empty = WikitextContent::new("");
        let replaced = empty
            .replace_section(&SectionId::New, &Content::wikitext("Body"), None, &services)
            .expect("replace")
            .expect("supported");
        assert_eq!(replaced.native_data(), "Body");
    }

    #[test]
    fn new_section_hook_can_place_text() {
        let mut hooks = ContentHooks::new();
        hooks.add_new_section_hook(|section, _| {
            Some(format!("{}{}\n\n{}", section.subject, section.body, section.existing))
        });
        let services = ContentServices::default().with_hooks(hooks);
        let replaced = WikitextContent::new("Old")
            .replace_section(
                &SectionId::New,
                &Content::wikitext("New"),
                Some("Top"),
                &services,
            )
            .expect("replace")
            .expect("supported");
        assert_eq!(replaced.native_data(), "== Top ==\n\nNew\n\nOld");
    }

    #[test]
    fn missing_section_leaves_content_unchanged() {
        let services = ContentServices::default();
        let content = WikitextContent::new("== A ==\nalpha");
        let replaced = content
            .replace_section(
                &SectionId::Index(4),
                &Content::wikitext("x"),
                None,
                &services,
            )
            .expect("replace")
            .expect("supported");
        assert_eq!(replaced.native_data(), "== A ==\nalpha");
    }

    #[test]
    fn diff_rejects_wikitext_with_another_tag() {
        let services = ContentServices::default();
        let variant: Content = WikitextContent::with_model("a", ModelTag::new("wikitext-variant")).into();
        let error = Content::wikitext("a")
            .diff(&variant, None, &services)
            .expect_err("different tags");
        assert!(matches!(error, ContentError::ModelMismatch { .. }));
    }

    #[test]
    fn add_section_header_prepends_heading() {
        let services = ContentServices::default();
        let content = WikitextContent::new("Body").add_section_header("Topic", &services);
        assert_eq!(content.native_data(), "== Topic ==\n\nBody");
    }

    #[test]
    fn pre_save_returns_same_value_when_nothing_changes() {
        let services = ContentServices::default();
        let content = WikitextContent::new("Stable text");
        let saved = content.pre_save_transform(
            &page(),
            &User::new("Alice"),
            &services.default_parser_options(),
            &services,
        );
        assert_eq!(saved.native_data(), "Stable text");
    }
}
