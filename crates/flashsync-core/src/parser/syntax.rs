//! Token matching and id comment formats.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{NoteId, SyntaxConfig};

/// Prefix of the per-note tag line inside a block note.
pub const TAG_PREFIX: &str = "Tags:";

/// Category used for inline notes that name none.
pub const DEFAULT_CATEGORY: &str = "Basic";

/// Category used for inline notes that name none but contain clozes.
pub const CLOZE_CATEGORY: &str = "Cloze";

/// Optional id comment following a custom-regexp note; its group is the last one.
pub const ID_SUFFIX: &str = r"(?:\n(?:<!--)?ID: (\d+)(?:-->)?)?";

/// A line holding nothing but an id comment.
pub static ID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:<!--)?ID: (\d+)(?:-->)?\s*$").expect("Invalid id line regex")
});

/// An id comment anywhere in a line.
pub static ID_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:<!--)?ID: (\d+)(?:-->)?").expect("Invalid inline id regex")
});

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:```|~~~)").expect("Invalid fence regex"));

/// Render the id marker written back into the source.
pub fn id_comment(id: NoteId, id_comments: bool) -> String {
    if id_comments {
        format!("<!--ID: {id}-->")
    } else {
        format!("ID: {id}")
    }
}

/// Parse the id out of a line that consists of an id comment only.
pub fn id_from_line(line: &str) -> Option<NoteId> {
    ID_LINE
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
}

/// Every id comment in `text`, wherever it appears.
pub fn ids_in(text: &str) -> impl Iterator<Item = NoteId> + '_ {
    ID_INLINE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<NoteId>().ok())
}

pub fn is_fence(line: &str) -> bool {
    FENCE.is_match(line)
}

/// Whether `line` is exactly `token`, ignoring surrounding whitespace.
pub fn is_token(line: &str, token: &str) -> bool {
    line.trim() == token
}

/// Pattern for `BEGIN [Category] content END` on one line.
pub fn inline_pattern(syntax: &SyntaxConfig) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"{}\s+(.*?)\s*{}",
        regex::escape(&syntax.begin_inline_note),
        regex::escape(&syntax.end_inline_note)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lines_accept_both_formats() {
        assert_eq!(id_from_line("<!--ID: 1234-->"), Some(NoteId::new(1234)));
        assert_eq!(id_from_line("  ID: 99 "), Some(NoteId::new(99)));
        assert_eq!(id_from_line("ID: abc"), None);
        assert_eq!(id_from_line("Front: ID: 12"), None);
    }

    #[test]
    fn ids_in_finds_comments_mid_line() {
        let ids: Vec<NoteId> = ids_in("STARTI Q Back: A <!--ID: 102--> ENDI ID: 7").collect();
        assert_eq!(ids, vec![NoteId::new(102), NoteId::new(7)]);
    }

    #[test]
    fn id_comment_formats() {
        assert_eq!(id_comment(NoteId::new(5), true), "<!--ID: 5-->");
        assert_eq!(id_comment(NoteId::new(5), false), "ID: 5");
    }

    #[test]
    fn inline_pattern_escapes_tokens() {
        let mut syntax = SyntaxConfig::default();
        syntax.begin_inline_note = "[[".to_string();
        syntax.end_inline_note = "]]".to_string();
        let pattern = inline_pattern(&syntax).unwrap();
        let caps = pattern.captures("see [[ Front text Back: back ]] here").unwrap();
        assert_eq!(&caps[1], "Front text Back: back");
    }

    #[test]
    fn fences_and_tokens() {
        assert!(is_fence("```rust"));
        assert!(is_fence("  ~~~"));
        assert!(!is_fence("text ```"));
        assert!(is_token("START  ", "START"));
        assert!(!is_token("STARTI", "START"));
    }
}
