use std::sync::LazyLock;

use regex::Regex;

use super::escape_html;
use super::sections::{parse_heading_line, scan_headings};
use super::strip::StripState;
use crate::options::ParserOptions;
use crate::output::{RenderOutput, SectionHeading};
use crate::title::{Namespace, Title, anchor_encode};

const URL_SCHEMES: [&str; 4] = ["https://", "http://", "mailto:", "//"];

static BEHAVIOR_SWITCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__[A-Z]+__").expect("behavior switch pattern"));

/// Renders wikitext into `output`, filling link tables and, when asked, HTML.
pub(crate) fn render_wikitext(
    text: &str,
    title: &Title,
    options: &ParserOptions,
    generate_html: bool,
    output: &mut RenderOutput,
) {
    for (index, heading) in scan_headings(text).into_iter().enumerate() {
        output.push_section(SectionHeading {
            index: index + 1,
            level: heading.level,
            anchor: anchor_encode(&heading.line),
            line: heading.line,
            byte_offset: heading.start,
        });
    }

    let (stripped, strip_state) = StripState::strip(text);
    let stripped = BEHAVIOR_SWITCH.replace_all(&stripped, "");

    let mut blocks = BlockWriter::new(InlineRenderer::new(title, options));
    for line in stripped.lines() {
        if let Some(item) = strip_state.block_line(line) {
            blocks.raw_block(&item.html);
        } else {
            blocks.line(line, output);
        }
    }
    let html = blocks.finish();

    if generate_html {
        let html = strip_state.unstrip(&html);
        let html = match &options.wrapper_class {
            Some(class) => format!("<div class=\"{}\">{html}</div>", escape_html(class)),
            None => html,
        };
        output.set_html(Some(html));
    } else {
        output.set_html(None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Numbered,
    Indent,
}

impl ListKind {
    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '*' => Some(Self::Bullet),
            '#' => Some(Self::Numbered),
            ':' => Some(Self::Indent),
            _ => None,
        }
    }

    fn open(self) -> &'static str {
        match self {
            Self::Bullet => "<ul>",
            Self::Numbered => "<ol>",
            Self::Indent => "<dl>",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Self::Bullet => "</ul>",
            Self::Numbered => "</ol>",
            Self::Indent => "</dl>",
        }
    }

    fn item(self) -> (&'static str, &'static str) {
        match self {
            Self::Indent => ("<dd>", "</dd>"),
            _ => ("<li>", "</li>"),
        }
    }
}

struct BlockWriter<'a> {
    html: String,
    paragraph: Vec<String>,
    preformatted: Vec<String>,
    lists: Vec<ListKind>,
    inline: InlineRenderer<'a>,
}

impl<'a> BlockWriter<'a> {
    fn new(inline: InlineRenderer<'a>) -> Self {
        Self {
            html: String::new(),
            paragraph: Vec::new(),
            preformatted: Vec::new(),
            lists: Vec::new(),
            inline,
        }
    }

    fn line(&mut self, line: &str, output: &mut RenderOutput) {
        if let Some((level, heading)) = parse_heading_line(line) {
            self.flush_all();
            let inner = self.inline.render(&heading, output);
            self.html.push_str(&format!(
                "<h{level}><span class=\"mw-headline\" id=\"{}\">{inner}</span></h{level}>\n",
                escape_html(&anchor_encode(&heading))
            ));
            return;
        }
        if line.trim().is_empty() {
            self.flush_all();
            return;
        }
        if line.starts_with("----") {
            self.flush_all();
            self.html.push_str("<hr />\n");
            return;
        }

        let markers: Vec<ListKind> = line.chars().map_while(ListKind::from_marker).collect();
        if !markers.is_empty() {
            self.flush_paragraph();
            self.flush_preformatted();
            self.set_lists(&markers);
            let body = &line[markers.len()..];
            let (open, close) = markers[markers.len() - 1].item();
            let inner = self.inline.render(body.trim(), output);
            self.html.push_str(&format!("{open}{inner}{close}\n"));
            return;
        }

        self.set_lists(&[]);
        if let Some(body) = line.strip_prefix(' ') {
            self.flush_paragraph();
            let rendered = self.inline.render(body, output);
            self.preformatted.push(rendered);
            return;
        }

        self.flush_preformatted();
        let rendered = self.inline.render(line, output);
        self.paragraph.push(rendered);
    }

    fn raw_block(&mut self, html: &str) {
        self.flush_all();
        self.html.push_str(html);
        self.html.push('\n');
    }

    fn set_lists(&mut self, wanted: &[ListKind]) {
        let common = self
            .lists
            .iter()
            .zip(wanted)
            .take_while(|(open, want)| open == want)
            .count();
        while self.lists.len() > common {
            if let Some(kind) = self.lists.pop() {
                self.html.push_str(kind.close());
                self.html.push('\n');
            }
        }
        for kind in &wanted[common..] {
            self.html.push_str(kind.open());
            self.html.push('\n');
            self.lists.push(*kind);
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        self.html.push_str("<p>");
        self.html.push_str(&self.paragraph.join("\n"));
        self.html.push_str("\n</p>\n");
        self.paragraph.clear();
    }

    fn flush_preformatted(&mut self) {
        if self.preformatted.is_empty() {
            return;
        }
        self.html.push_str("<pre>");
        self.html.push_str(&self.preformatted.join("\n"));
        self.html.push_str("\n</pre>\n");
        self.preformatted.clear();
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_preformatted();
        self.set_lists(&[]);
    }

    fn finish(mut self) -> String {
        self.flush_all();
        self.html
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteTag {
    Bold,
    Italic,
}

impl QuoteTag {
    fn name(self) -> &'static str {
        match self {
            Self::Bold => "b",
            Self::Italic => "i",
        }
    }
}

struct InlineRenderer<'a> {
    title: &'a Title,
    options: &'a ParserOptions,
    autonumber: usize,
}

impl<'a> InlineRenderer<'a> {
    fn new(title: &'a Title, options: &'a ParserOptions) -> Self {
        Self {
            title,
            options,
            autonumber: 0,
        }
    }

    fn render(&mut self, text: &str, output: &mut RenderOutput) -> String {
        let mut html = String::with_capacity(text.len());
        let mut quotes: Vec<QuoteTag> = Vec::new();
        let mut cursor = 0usize;

        while cursor < text.len() {
            let rest = &text[cursor..];

            if rest.starts_with("[[")
                && let Some((rendered, consumed)) = self.internal_link(rest, output)
            {
                html.push_str(&rendered);
                cursor += consumed;
                continue;
            }
            if rest.starts_with("{{{")
                && let Some(end) = rest.find("}}}")
            {
                html.push_str(&escape_html(&rest[..end + 3]));
                cursor += end + 3;
                continue;
            }
            if rest.starts_with("{{")
                && let Some((rendered, consumed)) = self.template(rest, output)
            {
                html.push_str(&rendered);
                cursor += consumed;
                continue;
            }
            if let Some(after_bracket) = rest.strip_prefix('[')
                && starts_with_url(after_bracket)
                && let Some((rendered, consumed)) = self.external_link(rest, output)
            {
                html.push_str(&rendered);
                cursor += consumed;
                continue;
            }
            if starts_with_url(rest)
                && !rest.starts_with("//")
                && !text[..cursor].ends_with(|ch: char| ch.is_alphanumeric())
            {
                let (rendered, consumed) = self.free_link(rest, output);
                html.push_str(&rendered);
                cursor += consumed;
                continue;
            }
            if rest.starts_with("''") {
                let run = rest.len() - rest.trim_start_matches('\'').len();
                cursor += run;
                let (literal, toggles): (usize, &[QuoteTag]) = match run {
                    2 => (0, &[QuoteTag::Italic]),
                    3 => (0, &[QuoteTag::Bold]),
                    4 => (1, &[QuoteTag::Bold]),
                    _ => (run - 5, &[QuoteTag::Bold, QuoteTag::Italic]),
                };
                html.push_str(&"&#39;".repeat(literal));
                for tag in toggles {
                    toggle_quote(&mut quotes, *tag, &mut html);
                }
                continue;
            }

            let Some(ch) = rest.chars().next() else {
                break;
            };
            push_escaped_char(&mut html, ch);
            cursor += ch.len_utf8();
        }

        while let Some(tag) = quotes.pop() {
            html.push_str(&format!("</{}>", tag.name()));
        }
        html
    }

    fn internal_link(&self, rest: &str, output: &mut RenderOutput) -> Option<(String, usize)> {
        let end = rest[2..].find("]]")? + 2;
        let inner = &rest[2..end];
        let mut consumed = end + 2;

        let (target, label) = match inner.split_once('|') {
            Some((target, label)) => (target.trim(), Some(label.trim())),
            None => (inner.trim(), None),
        };
        let leading_colon = target.starts_with(':');

        if let Some(fragment) = target.strip_prefix('#') {
            let anchor = self.title.page().with_fragment(Some(fragment));
            let shown = label.filter(|label| !label.is_empty()).unwrap_or(target);
            return Some((
                format!(
                    "<a href=\"{}\">{}</a>",
                    escape_html(&anchor.local_url()),
                    escape_html(shown)
                ),
                consumed,
            ));
        }

        let linked = Title::parse(target)?;
        if linked.namespace() == Namespace::Category && !leading_colon {
            let sort_key = label
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| self.title.text());
            output.add_category(linked.text(), sort_key);
            return Some((String::new(), consumed));
        }

        output.add_link(&linked);
        let trail: String = rest[consumed..]
            .chars()
            .take_while(|ch| ch.is_ascii_lowercase())
            .collect();
        consumed += trail.len();
        let shown = match label.filter(|label| !label.is_empty()) {
            Some(label) => label.to_string(),
            None => target.trim_start_matches(':').to_string(),
        };
        Some((
            format!(
                "<a href=\"{}\" title=\"{}\">{}{}</a>",
                escape_html(&linked.local_url()),
                escape_html(&linked.prefixed_text()),
                escape_html(&shown),
                escape_html(&trail)
            ),
            consumed,
        ))
    }

    fn template(&self, rest: &str, output: &mut RenderOutput) -> Option<(String, usize)> {
        let end = matching_braces(rest)?;
        let inner = &rest[2..end];
        let consumed = end + 2;
        let name = inner.split('|').next().unwrap_or("").trim();
        if name.is_empty() || name.starts_with('#') {
            return Some((String::new(), consumed));
        }

        let linked = if let Some(main) = name.strip_prefix(':') {
            Title::parse(main).map(|title| Title::new(Namespace::Main, title.text()))
        } else {
            match Title::parse(name) {
                Some(title) if title.namespace() != Namespace::Main => Some(title),
                // magic words such as DISPLAYTITLE:x
                Some(_) if name.contains(':') => None,
                Some(title) => Some(Title::new(Namespace::Template, title.text())),
                None => None,
            }
        };
        let Some(linked) = linked else {
            return Some((String::new(), consumed));
        };

        output.add_template(&linked);
        Some((
            format!(
                "<a href=\"{}\" class=\"new\" title=\"{}\">{}</a>",
                escape_html(&linked.local_url()),
                escape_html(&linked.prefixed_text()),
                escape_html(&linked.prefixed_text())
            ),
            consumed,
        ))
    }

    fn external_link(&mut self, rest: &str, output: &mut RenderOutput) -> Option<(String, usize)> {
        let end = rest.find(']')?;
        let inner = &rest[1..end];
        let (url, label) = match inner.split_once(char::is_whitespace) {
            Some((url, label)) => (url, label.trim()),
            None => (inner, ""),
        };
        output.add_external_link(url);

        let target = self.target_attribute();
        let html = if label.is_empty() {
            self.autonumber += 1;
            format!(
                "<a rel=\"nofollow\" class=\"external autonumber\" href=\"{}\"{target}>[{}]</a>",
                escape_html(url),
                self.autonumber
            )
        } else {
            format!(
                "<a rel=\"nofollow\" class=\"external text\" href=\"{}\"{target}>{}</a>",
                escape_html(url),
                escape_html(label)
            )
        };
        Some((html, end + 1))
    }

    fn free_link(&self, rest: &str, output: &mut RenderOutput) -> (String, usize) {
        let raw_end = rest
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '<' | '>' | '[' | ']' | '"'))
            .unwrap_or(rest.len());
        let url = rest[..raw_end].trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        output.add_external_link(url);
        (
            format!(
                "<a rel=\"nofollow\" class=\"external free\" href=\"{}\"{}>{}</a>",
                escape_html(url),
                self.target_attribute(),
                escape_html(url)
            ),
            url.len(),
        )
    }

    fn target_attribute(&self) -> String {
        match &self.options.external_link_target {
            Some(target) => format!(" target=\"{}\"", escape_html(target)),
            None => String::new(),
        }
    }
}

fn starts_with_url(text: &str) -> bool {
    URL_SCHEMES.iter().any(|scheme| {
        text.len() > scheme.len()
            && text
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Byte offset of the `}}` closing the `{{` at the start of `text`.
fn matching_braces(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut index = 0usize;
    while index + 1 < bytes.len() {
        if bytes[index] == b'{' && bytes[index + 1] == b'{' {
            depth += 1;
            index += 2;
        } else if bytes[index] == b'}' && bytes[index + 1] == b'}' {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(index);
            }
            index += 2;
        } else {
            index += 1;
        }
    }
    None
}

fn toggle_quote(stack: &mut Vec<QuoteTag>, tag: QuoteTag, html: &mut String) {
    let Some(position) = stack.iter().rposition(|open| *open == tag) else {
        html.push_str(&format!("<{}>", tag.name()));
        stack.push(tag);
        return;
    };
    let reopen: Vec<QuoteTag> = stack.drain(position + 1..).collect();
    for open in reopen.iter().rev() {
        html.push_str(&format!("</{}>", open.name()));
    }
    stack.pop();
    html.push_str(&format!("</{}>", tag.name()));
    for open in reopen {
        html.push_str(&format!("<{}>", open.name()));
        stack.push(open);
    }
}

fn push_escaped_char(html: &mut String, ch: char) {
    match ch {
        '&' => html.push_str("&amp;"),
        '<' => html.push_str("&lt;"),
        '>' => html.push_str("&gt;"),
        '"' => html.push_str("&quot;"),
        _ => html.push(ch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;

    fn render(text: &str, generate_html: bool) -> RenderOutput {
        let title = Title::new(Namespace::Main, "Sandbox");
        let mut options = ParserOptions::canonical(&ContentConfig::default());
        options.wrapper_class = None;
        let mut output = RenderOutput::new();
        render_wikitext(text, &title, &options, generate_html, &mut output);
        output
    }

    #[test]
    fn paragraphs_links_and_emphasis() {
        let output = render("Hello '''bold''' and ''it'' [[Alpha|first]] [[beta]]s.", true);
        assert_eq!(
            output.html(),
            Some(
                "<p>Hello <b>bold</b> and <i>it</i> <a href=\"/wiki/Alpha\" title=\"Alpha\">first</a> \
                 <a href=\"/wiki/Beta\" title=\"Beta\">betas</a>.\n</p>\n"
            )
        );
        assert_eq!(output.links().len(), 2);
    }

    #[test]
    fn categories_are_recorded_not_rendered() {
        let output = render("Body [[Category:People|Doe]] [[:Category:Lists]]", true);
        assert_eq!(output.categories().get("People").map(String::as_str), Some("Doe"));
        assert_eq!(output.links().len(), 1);
        let html = output.html().expect("html");
        assert!(!html.contains("People"));
        assert!(html.contains("/wiki/Category:Lists"));
    }

    #[test]
    fn headings_and_lists_render_as_blocks() {
        let output = render("== Intro ==\n* one\n* two\n# first\n----\n code", true);
        let html = output.html().expect("html");
        assert!(html.starts_with("<h2><span class=\"mw-headline\" id=\"Intro\">Intro</span></h2>\n"));
        assert!(html.contains("<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n<ol>\n<li>first</li>\n</ol>\n"));
        assert!(html.contains("<hr />\n<pre>code\n</pre>\n"));
        assert_eq!(output.sections().len(), 1);
        assert_eq!(output.sections()[0].anchor, "Intro");
    }

    #[test]
    fn unclosed_heading_markers_stay_in_paragraphs() {
        let output = render("=x\n== A", true);
        assert_eq!(output.html(), Some("<p>=x\n== A\n</p>\n"));
        assert!(output.sections().is_empty());
    }

    #[test]
    fn templates_and_external_links_are_tracked() {
        let output = render(
            "{{Infobox|name={{PAGENAME}}}} {{#if:x|y}} [https://example.org Example] [http://a.test] see https://b.test/path.",
            true,
        );
        let templates: Vec<String> = output.templates().iter().map(Title::prefixed_text).collect();
        assert_eq!(templates, vec!["Template:Infobox".to_string()]);
        assert_eq!(output.external_links().len(), 3);
        assert!(output.external_links().contains("https://b.test/path"));
        let html = output.html().expect("html");
        assert!(html.contains("class=\"external autonumber\" href=\"http://a.test\">[1]</a>"));
    }

    #[test]
    fn nowiki_and_comments_are_inert() {
        let output = render("<nowiki>[[Not a link]] <b></nowiki><!-- [[Hidden]] -->", true);
        assert!(!output.has_links());
        assert_eq!(
            output.html(),
            Some("<p>[[Not a link]] &lt;b&gt;\n</p>\n")
        );
    }

    #[test]
    fn metadata_only_render_skips_html() {
        let output = render("[[Alpha]] [[Category:Beta]]", false);
        assert!(output.html().is_none());
        assert!(output.has_links());
        assert_eq!(output.categories().len(), 1);
    }

    #[test]
    fn raw_html_is_escaped() {
        let output = render("<script>alert(1)</script>", true);
        assert_eq!(
            output.html(),
            Some("<p>&lt;script&gt;alert(1)&lt;/script&gt;\n</p>\n")
        );
    }

    #[test]
    fn mismatched_quotes_nest_properly() {
        let output = render("'''bold ''both''' italic''", true);
        assert_eq!(
            output.html(),
            Some("<p><b>bold <i>both</i></b><i> italic</i>\n</p>\n")
        );
    }
}
