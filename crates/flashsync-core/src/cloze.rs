//! Cloze-deletion detection and CurlyCloze conversion.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::Note;

static CLOZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{c\d+::[\s\S]+?\}\}").expect("Invalid cloze regex"));

// `{answer}`, `{2:answer}` or `{2|answer}`
static CURLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:(\d+)[:|])?([^{}]+)\}").expect("Invalid curly cloze regex"));

/// Whether `text` contains at least one well-formed `{{cN::content}}` marker.
pub fn has_clozes(text: &str) -> bool {
    CLOZE_PATTERN.is_match(text)
}

/// Whether any field of `note` contains a cloze deletion.
pub fn note_has_clozes(note: &Note) -> bool {
    note.fields.values().any(|content| has_clozes(content))
}

/// Whether converting curly markers in `text` would change it.
pub fn has_curly_clozes(text: &str) -> bool {
    curly_to_cloze(text) != text
}

/// Convert `{answer}` style markers into `{{cN::answer}}`.
///
/// Unnumbered markers are numbered from 1 in order of appearance, skipping
/// numbers already taken by explicit `{N:answer}` markers. Text that already
/// contains proper clozes is returned unchanged.
pub fn curly_to_cloze(text: &str) -> String {
    if has_clozes(text) {
        return text.to_string();
    }

    let taken: Vec<u32> = CURLY_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|number| number.as_str().parse().ok()))
        .collect();
    let mut next = 0_u32;

    CURLY_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |found| found.as_str());
            let start = caps.get(0).map_or(0, |found| found.start());
            if text[..start].ends_with('{') {
                return whole.to_string();
            }
            let number = caps
                .get(1)
                .and_then(|number| number.as_str().parse().ok())
                .unwrap_or_else(|| {
                    next += 1;
                    while taken.contains(&next) {
                        next += 1;
                    }
                    next
                });
            format!("{{{{c{number}::{}}}}}", &caps[2])
        })
        .into_owned()
}
