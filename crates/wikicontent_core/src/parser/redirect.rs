use std::sync::LazyLock;

use regex::Regex;

use crate::title::Title;

static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\A\s*#REDIRECT\s*:?\s*\[\[([^\[\]|]*)(?:\|[^\[\]]*)?\]\]")
        .expect("redirect directive pattern")
});

/// Target of a leading `#REDIRECT [[...]]` directive and the text after it.
///
/// Directives naming an unparsable title or a special page are not redirects.
pub fn redirect_target_and_text(text: &str) -> Option<(Title, &str)> {
    let captures = REDIRECT.captures(text)?;
    let whole = captures.get(0)?;
    let target = captures.get(1)?.as_str();
    let title = Title::parse(target).filter(Title::is_valid_redirect_target)?;
    Some((title, &text[whole.end()..]))
}

/// Directive text pointing at `target`.
pub fn make_redirect_text(target: &Title) -> String {
    format!("#REDIRECT [[{}]]", target.full_text())
}
