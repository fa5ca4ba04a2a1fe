use serde::Serialize;
use similar::{Algorithm, DiffOp, capture_diff_slices};

/// One run of a line diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DiffEdit {
    Copy { lines: Vec<String> },
    Add { lines: Vec<String> },
    Delete { lines: Vec<String> },
    Change { from: Vec<String>, to: Vec<String> },
}

/// Line-level difference between two contents of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDiff {
    edits: Vec<DiffEdit>,
}

impl ContentDiff {
    /// Diffs `old` against `new` line by line; an empty text is one empty line.
    pub fn between(old: &str, new: &str) -> Self {
        let old_lines: Vec<&str> = old.split('\n').collect();
        let new_lines: Vec<&str> = new.split('\n').collect();
        let owned = |lines: &[&str]| -> Vec<String> {
            lines.iter().map(|line| line.to_string()).collect()
        };

        let edits = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines)
            .into_iter()
            .map(|op| match op {
                DiffOp::Equal { old_index, len, .. } => DiffEdit::Copy {
                    lines: owned(&old_lines[old_index..old_index + len]),
                },
                DiffOp::Delete {
                    old_index, old_len, ..
                } => DiffEdit::Delete {
                    lines: owned(&old_lines[old_index..old_index + old_len]),
                },
                DiffOp::Insert {
                    new_index, new_len, ..
                } => DiffEdit::Add {
                    lines: owned(&new_lines[new_index..new_index + new_len]),
                },
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => DiffEdit::Change {
                    from: owned(&old_lines[old_index..old_index + old_len]),
                    to: owned(&new_lines[new_index..new_index + new_len]),
                },
            })
            .collect();
        Self { edits }
    }

    pub fn edits(&self) -> &[DiffEdit] {
        &self.edits
    }

    /// True when both sides were identical.
    pub fn is_empty(&self) -> bool {
        self.edits
            .iter()
            .all(|edit| matches!(edit, DiffEdit::Copy { .. }))
    }

    pub fn added_lines(&self) -> usize {
        self.edits
            .iter()
            .map(|edit| match edit {
                DiffEdit::Add { lines } => lines.len(),
                DiffEdit::Change { to, .. } => to.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn deleted_lines(&self) -> usize {
        self.edits
            .iter()
            .map(|edit| match edit {
                DiffEdit::Delete { lines } => lines.len(),
                DiffEdit::Change { from, .. } => from.len(),
                _ => 0,
            })
            .sum()
    }

    /// Plain rendering with ` `, `-` and `+` line prefixes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut push = |prefix: char, lines: &[String]| {
            for line in lines {
                out.push(prefix);
                out.push_str(line);
                out.push('\n');
            }
        };
        for edit in &self.edits {
            match edit {
                DiffEdit::Copy { lines } => push(' ', lines),
                DiffEdit::Add { lines } => push('+', lines),
                DiffEdit::Delete { lines } => push('-', lines),
                DiffEdit::Change { from, to } => {
                    push('-', from);
                    push('+', to);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_produce_only_copies() {
        let diff = ContentDiff::between("a\nb", "a\nb");
        assert!(diff.is_empty());
        assert_eq!(diff.added_lines(), 0);
        assert_eq!(diff.render(), " a\n b\n");
    }

    #[test]
    fn changed_line_is_reported_once_each_side() {
        let diff = ContentDiff::between("a\nb\nc", "a\nB\nc");
        assert!(!diff.is_empty());
        assert_eq!(diff.added_lines(), 1);
        assert_eq!(diff.deleted_lines(), 1);
        assert_eq!(diff.render(), " a\n-b\n+B\n c\n");
    }

    #[test]
    fn appended_lines_are_additions() {
        let diff = ContentDiff::between("a", "a\nb\nc");
        assert_eq!(diff.added_lines(), 2);
        assert_eq!(diff.deleted_lines(), 0);
        assert!(
            diff.edits()
                .iter()
                .any(|edit| matches!(edit, DiffEdit::Add { lines } if lines.len() == 2))
        );
    }
}
