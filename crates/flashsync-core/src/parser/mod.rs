//! Note extraction from Markdown documents.
//!
//! A document is scanned line by line through an explicit state machine:
//!
//! | state            | line                         | next state                         |
//! |------------------|------------------------------|------------------------------------|
//! | Outside          | code fence                   | Fence                              |
//! | Outside          | `Begin Note`                 | `InBlock`                          |
//! | Outside          | directive token              | `AwaitingArgument`                 |
//! | Outside          | anything else                | Outside (inline notes scanned)     |
//! | `AwaitingArgument` | any                        | Outside (directive applied)        |
//! | `InBlock`        | `End Note`                   | Outside (block note emitted)       |
//! | `InBlock`        | `Begin Note`                 | `InBlock` (open block faulted)     |
//! | `InBlock`        | anything else                | `InBlock`                          |
//! | Fence            | code fence                   | Outside                            |
//!
//! Reaching the end of the document inside a block faults that block. Regions
//! claimed by blocks, inline notes, fences and delete directives are excluded
//! from the custom-regexp scan that follows.

mod custom;
mod fields;
mod syntax;

use std::collections::BTreeSet;

use regex::Regex;
use thiserror::Error;

use crate::cloze::{curly_to_cloze, has_clozes, has_curly_clozes};
use crate::models::{Note, NoteId, NoteOptions, Settings};
use crate::span::Span;

pub use fields::{split_block, split_inline, SplitBody};
pub use syntax::{id_comment, CLOZE_CATEGORY, DEFAULT_CATEGORY};

/// Malformed note syntax at a given line (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseFault {
    pub line: usize,
    pub message: String,
}

impl ParseFault {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Syntactic form a note was written in; decides how its id is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteForm {
    Block,
    Inline,
    Regex,
}

impl NoteForm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Inline => "inline",
            Self::Regex => "regex",
        }
    }

    /// Text inserted at the note's id position once the store assigns `id`.
    pub fn id_insertion(self, id: NoteId, id_comments: bool) -> String {
        let comment = id_comment(id, id_comments);
        match self {
            Self::Block => format!("{comment}\n"),
            Self::Inline => format!("{comment} "),
            Self::Regex => format!("\n{comment}"),
        }
    }
}

/// A note together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNote {
    /// Fields hold raw Markdown
    pub note: Note,
    pub span: Span,
    /// Where a newly assigned id is inserted
    pub id_position: usize,
    pub form: NoteForm,
    /// Fields that keep their previously synced value
    pub frozen_fields: BTreeSet<String>,
    pub line: usize,
}

/// Everything a parse pass found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub notes: Vec<ParsedNote>,
    /// Ids named by delete directives
    pub deletions: Vec<NoteId>,
    pub faults: Vec<ParseFault>,
    /// Categories used in the document that the settings don't know
    pub unknown_categories: BTreeSet<String>,
    /// Ids inside faulted regions; they must not be treated as removed
    pub retained_ids: BTreeSet<NoteId>,
}

impl ParsedDocument {
    /// Ids still present in the document, parsed or not.
    pub fn present_ids(&self) -> BTreeSet<NoteId> {
        self.notes
            .iter()
            .filter_map(|parsed| parsed.note.id)
            .chain(self.retained_ids.iter().copied())
            .collect()
    }
}

/// Parse every note in `text` using `settings`.
pub fn parse_document(text: &str, settings: &Settings) -> ParsedDocument {
    let mut parser = Parser::new(text, settings);
    parser.scan_lines();
    if settings.defaults.regex {
        parser.scan_custom();
    }
    parser.document
}

/// Parse context rewritten by directive lines.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scope {
    deck: String,
    file_tags: Vec<String>,
    frozen: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    start: usize,
    end: usize,
    content: &'a str,
}

#[derive(Debug, Clone, Copy)]
enum Directive {
    TargetDeck,
    FileTags,
    FrozenFields,
    Delete,
}

enum State<'a> {
    Outside,
    AwaitingArgument {
        directive: Directive,
        token: Line<'a>,
    },
    InBlock {
        begin: Line<'a>,
        body: Vec<Line<'a>>,
    },
    Fence {
        start: usize,
    },
}

struct Parser<'a> {
    text: &'a str,
    settings: &'a Settings,
    inline: Option<Regex>,
    scope: Scope,
    /// Scope in effect from each offset on, for notes found out of line order
    timeline: Vec<(usize, Scope)>,
    claimed: Vec<Span>,
    document: ParsedDocument,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, settings: &'a Settings) -> Self {
        let scope = Scope {
            deck: settings.defaults.deck.clone(),
            file_tags: Vec::new(),
            frozen: BTreeSet::new(),
        };
        let mut document = ParsedDocument::default();
        let inline = match syntax::inline_pattern(&settings.syntax) {
            Ok(pattern) => Some(pattern),
            Err(error) => {
                document
                    .faults
                    .push(ParseFault::new(0, format!("invalid inline note syntax: {error}")));
                None
            }
        };

        Self {
            text,
            settings,
            inline,
            timeline: vec![(0, scope.clone())],
            scope,
            claimed: Vec::new(),
            document,
        }
    }

    fn scan_lines(&mut self) {
        let mut state = State::Outside;
        let mut offset = 0;
        for (index, raw) in self.text.split_inclusive('\n').enumerate() {
            let content = raw.trim_end_matches(['\n', '\r']);
            let line = Line {
                number: index + 1,
                start: offset,
                end: offset + content.len(),
                content,
            };
            offset += raw.len();
            state = self.step(state, line);
        }
        self.finish(state);
    }

    fn step(&mut self, state: State<'a>, line: Line<'a>) -> State<'a> {
        let settings = self.settings;
        let tokens = &settings.syntax;
        match state {
            State::Outside => self.step_outside(line),
            State::AwaitingArgument { directive, token } => {
                self.apply_directive(directive, token, Some(line));
                State::Outside
            }
            State::InBlock { begin, mut body } => {
                if syntax::is_token(line.content, &tokens.end_note) {
                    self.emit_block(begin, &body, line);
                    State::Outside
                } else if syntax::is_token(line.content, &tokens.begin_note) {
                    self.fault_unterminated(begin, &body, line.start, Some(line.number));
                    State::InBlock {
                        begin: line,
                        body: Vec::new(),
                    }
                } else {
                    body.push(line);
                    State::InBlock { begin, body }
                }
            }
            State::Fence { start } => {
                if syntax::is_fence(line.content) {
                    self.claimed.push(Span::new(start, line.end));
                    State::Outside
                } else {
                    State::Fence { start }
                }
            }
        }
    }

    fn step_outside(&mut self, line: Line<'a>) -> State<'a> {
        let settings = self.settings;
        let tokens = &settings.syntax;
        let directive = if syntax::is_token(line.content, &tokens.target_deck_line) {
            Some(Directive::TargetDeck)
        } else if syntax::is_token(line.content, &tokens.file_tags_line) {
            Some(Directive::FileTags)
        } else if syntax::is_token(line.content, &tokens.frozen_fields_line) {
            Some(Directive::FrozenFields)
        } else if syntax::is_token(line.content, &tokens.delete_note_line) {
            Some(Directive::Delete)
        } else {
            None
        };

        if syntax::is_fence(line.content) {
            State::Fence { start: line.start }
        } else if syntax::is_token(line.content, &tokens.begin_note) {
            State::InBlock {
                begin: line,
                body: Vec::new(),
            }
        } else if let Some(directive) = directive {
            State::AwaitingArgument {
                directive,
                token: line,
            }
        } else {
            self.scan_inline(line);
            State::Outside
        }
    }

    fn finish(&mut self, state: State<'a>) {
        match state {
            State::Outside => {}
            State::AwaitingArgument { directive, token } => {
                self.apply_directive(directive, token, None);
            }
            State::InBlock { begin, body } => {
                self.fault_unterminated(begin, &body, self.text.len(), None);
            }
            State::Fence { start } => self.claimed.push(Span::new(start, self.text.len())),
        }
    }

    fn apply_directive(&mut self, directive: Directive, token: Line<'a>, argument: Option<Line<'a>>) {
        let value = argument.map_or("", |line| line.content.trim());
        match directive {
            Directive::TargetDeck => {
                if value.is_empty() {
                    self.fault(token.number, "target deck directive has no deck name");
                    return;
                }
                self.scope.deck = value.to_string();
            }
            Directive::FileTags => {
                self.scope.file_tags = value.split_whitespace().map(str::to_string).collect();
            }
            Directive::FrozenFields => {
                self.scope.frozen = value
                    .split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            Directive::Delete => {
                match syntax::id_from_line(value) {
                    Some(id) => {
                        self.document.deletions.push(id);
                        let end = argument.map_or(token.end, |line| line.end);
                        self.claimed.push(Span::new(token.start, end));
                    }
                    None => self.fault(token.number, "delete directive must be followed by an id line"),
                }
                return;
            }
        }
        let from = argument.map_or(token.end, |line| line.end);
        self.timeline.push((from, self.scope.clone()));
    }

    /// Keep every id written inside `lines` that no note will claim.
    fn retain_ids(&mut self, lines: &[Line<'a>]) {
        self.document
            .retained_ids
            .extend(lines.iter().flat_map(|line| syntax::ids_in(line.content)));
    }

    fn fault(&mut self, line: usize, message: impl Into<String>) {
        self.document.faults.push(ParseFault::new(line, message));
    }

    fn fault_unterminated(&mut self, begin: Line<'a>, body: &[Line<'a>], end: usize, next_begin: Option<usize>) {
        self.claimed.push(Span::new(begin.start, end));
        self.retain_ids(body);
        let end_note = &self.settings.syntax.end_note;
        let message = match next_begin {
            Some(line) => format!("note block is missing '{end_note}' before the next note on line {line}"),
            None => format!("note block is missing '{end_note}' before the end of the document"),
        };
        self.fault(begin.number, message);
    }

    fn emit_block(&mut self, begin: Line<'a>, body: &[Line<'a>], end: Line<'a>) {
        let span = Span::new(begin.start, end.end);
        self.claimed.push(span);

        let mut lines = body
            .iter()
            .skip_while(|line| line.content.trim().is_empty());
        let Some(category_line) = lines.next() else {
            self.fault(begin.number, "note block has no category line");
            return;
        };
        let category = category_line.content.trim();
        let settings = self.settings;
        let Some(fields) = settings.fields_for(category) else {
            self.unknown_category(category, begin.number);
            self.retain_ids(body);
            return;
        };

        let split = split_block(lines.map(|line| line.content), fields);
        let scope = self.scope.clone();
        self.push_note(NoteDraft {
            category: category.to_string(),
            split,
            scope: &scope,
            span,
            id_position: end.start,
            form: NoteForm::Block,
            line: begin.number,
        });
    }

    fn scan_inline(&mut self, line: Line<'a>) {
        let Some(pattern) = self.inline.clone() else {
            return;
        };
        let settings = self.settings;
        let end_token_len = settings.syntax.end_inline_note.len();

        for caps in pattern.captures_iter(line.content) {
            let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let span = Span::new(line.start + whole.start(), line.start + whole.end());
            self.claimed.push(span);

            let (category, content) = self.inline_category(content.as_str());
            let Some(fields) = settings.fields_for(&category) else {
                self.unknown_category(&category, line.number);
                self.document.retained_ids.extend(syntax::ids_in(content));
                continue;
            };
            let split = match split_inline(content, fields) {
                Ok(split) => split,
                Err(error) => {
                    self.fault(line.number, format!("cannot split inline note: {error}"));
                    continue;
                }
            };
            let scope = self.scope.clone();
            self.push_note(NoteDraft {
                category,
                split,
                scope: &scope,
                span,
                id_position: span.end - end_token_len,
                form: NoteForm::Inline,
                line: line.number,
            });
        }
    }

    /// Category named by a leading `[Category]`, or chosen from the content.
    fn inline_category<'c>(&self, content: &'c str) -> (String, &'c str) {
        if let Some(rest) = content.strip_prefix('[') {
            if let Some((category, rest)) = rest.split_once(']') {
                return (category.trim().to_string(), rest.trim_start());
            }
        }
        let clozed = has_clozes(content)
            || (self.settings.defaults.curly_cloze && has_curly_clozes(content));
        let category = if clozed {
            CLOZE_CATEGORY
        } else {
            DEFAULT_CATEGORY
        };
        (category.to_string(), content)
    }

    fn unknown_category(&mut self, category: &str, line: usize) {
        self.document
            .unknown_categories
            .insert(category.to_string());
        self.fault(line, format!("unknown category '{category}'"));
    }

    fn scope_at(&self, offset: usize) -> Scope {
        self.timeline
            .iter()
            .rev()
            .find(|(from, _)| *from <= offset)
            .map_or_else(|| self.scope.clone(), |(_, scope)| scope.clone())
    }

    fn push_note(&mut self, draft: NoteDraft<'_>) {
        let settings = self.settings;
        let defaults = &settings.defaults;
        let curly = defaults.curly_cloze && draft.category.contains(CLOZE_CATEGORY);

        let mut note = Note::new(draft.scope.deck.clone(), draft.category);
        note.fields = draft
            .split
            .values
            .into_iter()
            .map(|(field, content)| {
                let content = if curly {
                    curly_to_cloze(&content)
                } else {
                    content
                };
                (field, content)
            })
            .collect();
        if note.is_empty() {
            self.fault(draft.line, "note has no field content");
            self.document.retained_ids.extend(draft.split.id);
            return;
        }

        note.id = draft.split.id;
        note.options = NoteOptions {
            allow_duplicate: defaults.allow_duplicates,
            duplicate_scope: defaults.duplicate_scope.clone(),
        };
        if !defaults.tag.trim().is_empty() {
            note.tags.insert(defaults.tag.trim().to_string());
        }
        note.tags.extend(draft.scope.file_tags.iter().cloned());
        note.tags.extend(draft.split.tags);

        self.document.notes.push(ParsedNote {
            note,
            span: draft.span,
            id_position: draft.id_position,
            form: draft.form,
            frozen_fields: draft.scope.frozen.clone(),
            line: draft.line,
        });
    }
}

struct NoteDraft<'s> {
    category: String,
    split: SplitBody,
    scope: &'s Scope,
    span: Span,
    id_position: usize,
    form: NoteForm,
    line: usize,
}
