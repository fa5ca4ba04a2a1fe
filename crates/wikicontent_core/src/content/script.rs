use std::borrow::Cow;

use super::text::{self, TextContent};
use super::{Content, ContentValue, TextBacked};
use crate::error::ContentResult;
use crate::model::ModelTag;
use crate::options::{ParserOptions, User};
use crate::output::RenderOutput;
use crate::parser::escape_html;
use crate::services::ContentServices;
use crate::title::Title;

fn code_block(class: &str, source: &str) -> String {
    format!(
        "<pre class=\"mw-code {class}\" dir=\"ltr\">\n{}\n</pre>\n",
        escape_html(source)
    )
}

macro_rules! script_content {
    ($(#[$meta:meta])* $name:ident, $model:expr, $class:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(TextContent);

        impl $name {
            pub fn new(source: impl Into<String>) -> Self {
                Self(TextContent::with_model(source, $model))
            }

            pub fn text(&self) -> &str {
                self.0.text()
            }
        }

        impl TextBacked for $name {
            fn text(&self) -> Cow<'_, str> {
                Cow::Borrowed(self.0.text())
            }

            fn html(&self, _services: &ContentServices) -> ContentResult<String> {
                Ok(code_block($class, self.0.text()))
            }
        }

        impl ContentValue for $name {
            fn model(&self) -> &ModelTag {
                self.0.model()
            }

            fn native_data(&self) -> Cow<'_, str> {
                Cow::Borrowed(self.0.text())
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
                    self.0.model(),
                    self.0.text(),
                    title,
                    revision_id,
                    options,
                    generate_html,
                    services,
                    || self.html(services),
                )
            }

            /// Signatures and the pipe trick expand here too; the result is
            /// right-trimmed like any saved text.
            fn pre_save_transform(
                &self,
                title: &Title,
                user: &User,
                options: &ParserOptions,
                services: &ContentServices,
            ) -> Content {
                let transformed = services.parser().pre_save_transform(
                    self.0.text(),
                    title,
                    user,
                    options,
                    services.language(),
                );
                let transformed = transformed.trim_end();
                if transformed == self.0.text() {
                    return self.clone().into();
                }
                Self::new(transformed).into()
            }
        }
    };
}

script_content!(
    /// Site or user JavaScript, shown as a highlighted code block.
    JavaScriptContent,
    ModelTag::javascript(),
    "mw-js"
);

script_content!(
    /// Site or user stylesheet.
    CssContent,
    ModelTag::css(),
    "mw-css"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::SectionLookup;
    use crate::parser::SectionId;
    use crate::title::Namespace;

    #[test]
    fn javascript_renders_escaped_code_block() {
        let services = ContentServices::default();
        let content = JavaScriptContent::new("if (a < b) { run(\"x\"); }");
        let title = Title::new(Namespace::MediaWiki, "Common.js");
        let output = content
            .fill_parser_output(&title, None, &services.default_parser_options(), true, &services)
            .expect("render");
        assert_eq!(
            output.html(),
            Some(
                "<pre class=\"mw-code mw-js\" dir=\"ltr\">\nif (a &lt; b) { run(&quot;x&quot;); }\n</pre>\n"
            )
        );
    }

    #[test]
    fn css_collects_links_from_comments() {
        let services = ContentServices::default();
        let content = CssContent::new("/* see [[Style guide]] */\nbody { color: red; }");
        let title = Title::new(Namespace::MediaWiki, "Common.css");
        let output = content
            .fill_parser_output(&title, None, &services.default_parser_options(), true, &services)
            .expect("render");
        assert!(output.html().is_some_and(|html| html.starts_with("<pre class=\"mw-code mw-css\"")));
        assert!(output.links().contains(&Title::new(Namespace::Main, "Style guide")));
        assert_eq!(content.model().as_str(), "css");
    }

    #[test]
    fn script_pre_save_expands_signatures_and_trims() {
        let services = ContentServices::default();
        let content = JavaScriptContent::new("// maintained by ~~~\nvar a = 1;   \n\n");
        let saved = content.pre_save_transform(
            &Title::new(Namespace::User, "Alice/common.js"),
            &User::new("Alice"),
            &services.default_parser_options(),
            &services,
        );
        assert_eq!(
            saved.native_data(),
            "// maintained by [[User:Alice|Alice]] ([[User talk:Alice|talk]])\nvar a = 1;"
        );
        assert_eq!(saved.model().as_str(), "javascript");
    }

    #[test]
    fn scripts_have_no_sections_or_redirects() {
        let services = ContentServices::default();
        let content = JavaScriptContent::new("#REDIRECT [[Elsewhere]]");
        assert!(content.redirect_target(&services).is_none());
        assert!(matches!(
            content.section(&SectionId::Index(1), &services),
            SectionLookup::Unsupported
        ));
    }
}
