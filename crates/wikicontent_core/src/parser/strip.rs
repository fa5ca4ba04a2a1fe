use std::ops::Range;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

static PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?(?:-->|\z)|<nowiki\s*/>|<nowiki\s*>.*?</nowiki\s*>|<pre\b[^>]*>.*?</pre\s*>")
        .expect("protected span pattern")
});

static NOWIKI_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^<nowiki\s*>(.*)</nowiki\s*>$").expect("nowiki body pattern")
});

static PRE_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^<pre\b[^>]*>(.*)</pre\s*>$").expect("pre body pattern")
});

const MARKER_PREFIX: &str = "\u{7f}UNIQ-";
const MARKER_SUFFIX: &str = "-QINU\u{7f}";

static MARKER_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Byte ranges of comments, `<nowiki>` and `<pre>` blocks, where markup is inert.
pub(crate) fn protected_spans(text: &str) -> Vec<Range<usize>> {
    PROTECTED.find_iter(text).map(|found| found.range()).collect()
}

pub(crate) fn is_protected(spans: &[Range<usize>], position: usize) -> bool {
    spans.iter().any(|span| span.contains(&position))
}

/// Applies `transform` to every stretch of text outside protected spans.
pub(crate) fn map_unprotected(text: &str, mut transform: impl FnMut(&str) -> String) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for span in protected_spans(text) {
        output.push_str(&transform(&text[cursor..span.start]));
        output.push_str(&text[span.clone()]);
        cursor = span.end;
    }
    output.push_str(&transform(&text[cursor..]));
    output
}

#[derive(Debug, Clone)]
pub(crate) struct StashedItem {
    pub html: String,
    pub block: bool,
}

/// Placeholder table for pre-rendered fragments pulled out before markup parsing.
///
/// Markers carry a per-render salt that does not occur in the source text.
#[derive(Debug)]
pub(crate) struct StripState {
    prefix: String,
    items: Vec<StashedItem>,
}

impl StripState {
    /// Removes comments and replaces `<nowiki>`/`<pre>` blocks with markers.
    pub fn strip(text: &str) -> (String, Self) {
        let mut state = Self {
            prefix: unused_prefix(text),
            items: Vec::new(),
        };
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for span in protected_spans(text) {
            output.push_str(&text[cursor..span.start]);
            let raw = &text[span.clone()];
            if let Some(captures) = PRE_BODY.captures(raw) {
                let body = captures.get(1).map_or("", |body| body.as_str());
                output.push_str(&state.push(StashedItem {
                    html: format!("<pre>{}</pre>", super::escape_html(body)),
                    block: true,
                }));
            } else if let Some(captures) = NOWIKI_BODY.captures(raw) {
                let body = captures.get(1).map_or("", |body| body.as_str());
                output.push_str(&state.push(StashedItem {
                    html: super::escape_html(body),
                    block: false,
                }));
            }
            cursor = span.end;
        }
        output.push_str(&text[cursor..]);
        (output, state)
    }

    fn push(&mut self, item: StashedItem) -> String {
        self.items.push(item);
        self.marker(self.items.len() - 1)
    }

    /// The stashed block item if `line` is nothing but its marker.
    pub fn block_line(&self, line: &str) -> Option<&StashedItem> {
        let index = line
            .trim()
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(MARKER_SUFFIX)?
            .parse::<usize>()
            .ok()?;
        self.items.get(index).filter(|item| item.block)
    }

    pub fn unstrip(&self, html: &str) -> String {
        let mut output = html.to_string();
        for (index, item) in self.items.iter().enumerate() {
            output = output.replace(&self.marker(index), &item.html);
        }
        output
    }

    fn marker(&self, index: usize) -> String {
        format!("{}{index}{MARKER_SUFFIX}", self.prefix)
    }
}

fn unused_prefix(text: &str) -> String {
    loop {
        let serial = MARKER_SERIAL.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("{MARKER_PREFIX}{serial:08x}-");
        if !text.contains(&prefix) {
            return prefix;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_spans_cover_comments_and_nowiki() {
        let text = "a <!-- == x == --> b <nowiki>[[c]]</nowiki> d <!-- open";
        let spans = protected_spans(text);
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[1].clone()], "<nowiki>[[c]]</nowiki>");
        assert_eq!(spans[2].end, text.len());
    }

    #[test]
    fn map_unprotected_skips_nowiki() {
        let text = "~~~ <nowiki>~~~</nowiki> ~~~";
        let mapped = map_unprotected(text, |part| part.replace("~~~", "SIG"));
        assert_eq!(mapped, "SIG <nowiki>~~~</nowiki> SIG");
    }

    #[test]
    fn strip_state_round_trips_escaped_nowiki() {
        let (stripped, state) = StripState::strip("x<nowiki><b>y</b></nowiki><!-- gone -->z");
        assert!(!stripped.contains("<b>"));
        assert!(!stripped.contains("gone"));
        assert_eq!(state.unstrip(&stripped), "x&lt;b&gt;y&lt;/b&gt;z");
    }

    #[test]
    fn block_line_recognizes_pre_markers_only() {
        let (stripped, state) = StripState::strip("<pre>a < b</pre>\n<nowiki>n</nowiki>");
        let mut lines = stripped.lines();
        let first = lines.next().expect("first line");
        let second = lines.next().expect("second line");
        assert_eq!(
            state.block_line(first).map(|item| item.html.as_str()),
            Some("<pre>a &lt; b</pre>")
        );
        assert!(state.block_line(second).is_none());
    }

    #[test]
    fn literal_markers_in_source_are_not_expanded() {
        let (forged, _) = StripState::strip("<nowiki>a</nowiki>");
        let text = format!("{forged} <nowiki>b</nowiki>");
        let (stripped, state) = StripState::strip(&text);
        let unstripped = state.unstrip(&stripped);
        assert!(unstripped.starts_with(&forged));
        assert!(unstripped.ends_with(" b"));
        assert_eq!(state.block_line(&forged).map(|item| item.html.as_str()), None);
    }
}
