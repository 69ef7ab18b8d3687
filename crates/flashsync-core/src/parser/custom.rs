//! Notes recognized by per-category regular expressions.

use std::collections::HashSet;

use regex::Regex;

use super::syntax::ID_SUFFIX;
use super::{NoteDraft, NoteForm, Parser, SplitBody};
use crate::span::{find_ignoring, Span};

impl Parser<'_> {
    /// Scan every category with a non-empty pattern, in category-name order.
    ///
    /// Regions claimed by the line scan and by earlier categories are skipped.
    pub(super) fn scan_custom(&mut self) {
        let settings = self.settings;
        for (category, pattern) in &settings.custom_regexps {
            if pattern.trim().is_empty() {
                continue;
            }
            let Some(fields) = settings.fields_for(category) else {
                self.unknown_category(category, 0);
                continue;
            };
            let compiled = match Regex::new(&format!("(?m)(?:{pattern}){ID_SUFFIX}")) {
                Ok(compiled) => compiled,
                Err(error) => {
                    self.fault(0, format!("invalid pattern for category '{category}': {error}"));
                    continue;
                }
            };

            let id_group = compiled.captures_len() - 1;
            let mut seen = HashSet::new();
            let mut found = Vec::new();
            for matched in find_ignoring(&compiled, self.text, &self.claimed) {
                let span = Span::from(matched);
                if span.is_empty() || !seen.insert(span) {
                    continue;
                }
                let Some(caps) = compiled.captures_at(self.text, span.start) else {
                    continue;
                };
                if caps.get(0).map(Span::from) != Some(span) {
                    continue;
                }

                let values = fields
                    .iter()
                    .enumerate()
                    .map(|(index, field)| {
                        let value = if index + 1 < id_group {
                            caps.get(index + 1).map_or("", |group| group.as_str())
                        } else {
                            ""
                        };
                        (field.clone(), value.trim().to_string())
                    })
                    .collect();
                let id = caps.get(id_group).and_then(|group| group.as_str().parse().ok());
                found.push((span, SplitBody {
                    values,
                    id,
                    tags: Vec::new(),
                }));
            }

            for (span, split) in found {
                self.claimed.push(span);
                let scope = self.scope_at(span.start);
                let line = self.text[..span.start].matches('\n').count() + 1;
                self.push_note(NoteDraft {
                    category: category.clone(),
                    split,
                    scope: &scope,
                    span,
                    id_position: span.end,
                    form: NoteForm::Regex,
                    line,
                });
            }
        }
    }
}
