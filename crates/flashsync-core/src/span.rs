//! Interval arithmetic over regex match offsets.
//!
//! Spans are half-open `[start, end)` byte offsets into one document's text.
//! They are produced by a single scan pass and carry no ownership beyond it.

use regex::{Match, Regex};

/// Slack allowed on each edge when testing whether a span lies inside another.
///
/// Delimiter matches can start one character before or end one character after
/// the region they belong to (the newline that ends a token line, for example).
/// The slack shifts edges; it never lets a span outgrow its container by more
/// than this many characters in total.
pub const SPAN_TOLERANCE: usize = 1;

/// Half-open byte range over a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `self` lies within `container`, allowing [`SPAN_TOLERANCE`].
    #[must_use]
    pub const fn is_within(&self, container: &Self) -> bool {
        self.start + SPAN_TOLERANCE >= container.start
            && self.end <= container.end + SPAN_TOLERANCE
            && self.len() <= container.len() + SPAN_TOLERANCE
    }
}

impl From<Match<'_>> for Span {
    fn from(found: Match<'_>) -> Self {
        Self::new(found.start(), found.end())
    }
}

/// Every non-overlapping match of `pattern` in `text`, in document order.
pub fn spans(pattern: &Regex, text: &str) -> Vec<Span> {
    pattern.find_iter(text).map(Span::from).collect()
}

/// Whether `span` is contained in any of `spans`.
pub fn contained_in(span: Span, spans: &[Span]) -> bool {
    spans.iter().any(|container| span.is_within(container))
}

/// Lazily yield the matches of `pattern` that are not contained in `ignore`.
///
/// The iterator makes one pass over `text`; call again to rescan.
pub fn find_ignoring<'r, 't>(
    pattern: &'r Regex,
    text: &'t str,
    ignore: &'r [Span],
) -> impl Iterator<Item = Match<'t>> + 'r
where
    't: 'r,
{
    pattern
        .find_iter(text)
        .filter(move |found| !contained_in(Span::from(*found), ignore))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn contained_in_allows_one_character_of_slack() {
        assert!(contained_in(Span::new(5, 10), &[Span::new(4, 11)]));
        assert!(!contained_in(Span::new(5, 10), &[Span::new(6, 9)]));
        assert!(contained_in(Span::new(5, 10), &[Span::new(6, 11)]));
        assert!(contained_in(Span::new(5, 10), &[Span::new(4, 9)]));
    }

    #[test]
    fn contained_in_handles_span_at_start_of_text() {
        assert!(contained_in(Span::new(0, 3), &[Span::new(0, 3)]));
        assert!(!contained_in(Span::new(0, 3), &[]));
    }

    #[test]
    fn spans_returns_matches_in_order() {
        let pattern = Regex::new(r"\d+").unwrap();
        assert_eq!(
            spans(&pattern, "a1 b22 c333"),
            vec![Span::new(1, 2), Span::new(4, 6), Span::new(8, 11)]
        );
    }

    #[test]
    fn find_ignoring_skips_claimed_regions() {
        let pattern = Regex::new(r"Q: \w+").unwrap();
        let text = "Q: one\nSTART\nQ: two\nEND\nQ: three";
        let block = Span::new(7, 23);
        let found: Vec<&str> = find_ignoring(&pattern, text, &[block])
            .map(|found| found.as_str())
            .collect();
        assert_eq!(found, vec!["Q: one", "Q: three"]);
    }

    #[test]
    fn find_ignoring_without_ignore_spans_yields_everything() {
        let pattern = Regex::new(r"x").unwrap();
        assert_eq!(find_ignoring(&pattern, "xax", &[]).count(), 2);
    }
}
