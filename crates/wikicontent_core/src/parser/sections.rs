use std::fmt;
use std::ops::Range;

use super::strip::{is_protected, protected_spans};
use crate::title::anchor_encode;

/// Section address accepted by section get/replace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// The whole page (`""`).
    All,
    /// A section appended at the end (`"new"`).
    New,
    /// `0` is the lead, `n` the n-th heading.
    Index(usize),
    /// Heading anchor, matched after anchor encoding.
    Anchor(String),
}

impl SectionId {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::All
        } else if trimmed == "new" {
            Self::New
        } else if let Ok(index) = trimmed.parse::<usize>() {
            Self::Index(index)
        } else {
            Self::Anchor(trimmed.trim_start_matches('#').to_string())
        }
    }
}

impl From<usize> for SectionId {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => Ok(()),
            Self::New => f.write_str("new"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Anchor(anchor) => f.write_str(anchor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingLine {
    pub level: usize,
    pub line: String,
    pub start: usize,
}

/// Headings outside comments, `<nowiki>` and `<pre>`, in document order.
pub fn scan_headings(text: &str) -> Vec<HeadingLine> {
    let spans = protected_spans(text);
    let mut headings = Vec::new();
    let mut offset = 0usize;
    for raw_line in text.split_inclusive('\n') {
        let start = offset;
        offset += raw_line.len();
        if is_protected(&spans, start) {
            continue;
        }
        if let Some((level, line)) = parse_heading_line(raw_line.trim_end_matches(['\n', '\r'])) {
            headings.push(HeadingLine { level, line, start });
        }
    }
    headings
}

/// Level and inner text of an `== Heading ==` line.
pub fn parse_heading_line(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_end();
    if !trimmed.starts_with('=') {
        return None;
    }
    if trimmed.chars().all(|ch| ch == '=') {
        let count = trimmed.len();
        if count < 3 {
            return None;
        }
        let level = ((count - 1) / 2).min(6);
        return Some((level, "=".repeat(count - 2 * level)));
    }

    let open = trimmed.len() - trimmed.trim_start_matches('=').len();
    let close = trimmed.len() - trimmed.trim_end_matches('=').len();
    if open == 0 || close == 0 {
        return None;
    }
    let level = open.min(close).min(6);
    let inner = trimmed[level..trimmed.len() - level].trim();
    if inner.is_empty() {
        return None;
    }
    Some((level, inner.to_string()))
}

fn section_range(text: &str, headings: &[HeadingLine], section: &SectionId) -> Option<Range<usize>> {
    match section {
        SectionId::All => Some(0..text.len()),
        SectionId::New => None,
        SectionId::Index(0) => Some(0..headings.first().map_or(text.len(), |first| first.start)),
        SectionId::Index(index) => {
            let position = index - 1;
            let heading = headings.get(position)?;
            let end = headings[position + 1..]
                .iter()
                .find(|next| next.level <= heading.level)
                .map_or(text.len(), |next| next.start);
            Some(heading.start..end)
        }
        SectionId::Anchor(anchor) => {
            let wanted = anchor_encode(anchor);
            let position = headings
                .iter()
                .position(|heading| anchor_encode(&heading.line) == wanted)?;
            section_range(text, headings, &SectionId::Index(position + 1))
        }
    }
}

/// Text of one section, trailing whitespace removed; `None` if it does not exist.
pub fn extract_section(text: &str, section: &SectionId) -> Option<String> {
    let headings = scan_headings(text);
    let range = section_range(text, &headings, section)?;
    Some(text[range].trim_end().to_string())
}

/// Swaps one section for `new_text`, leaving every byte outside it untouched.
///
/// A blank line separates the replacement from whatever follows it.
pub fn replace_section(text: &str, section: &SectionId, new_text: &str) -> Option<String> {
    if *section == SectionId::All {
        return Some(new_text.to_string());
    }
    let headings = scan_headings(text);
    let range = section_range(text, &headings, section)?;
    let before = &text[..range.start];
    let after = &text[range.end..];
    let replacement = new_text.trim_end();

    let mut output = String::with_capacity(before.len() + replacement.len() + after.len() + 2);
    output.push_str(before);
    output.push_str(replacement);
    if !after.is_empty() {
        if !replacement.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str(after);
    }
    Some(output)
}
