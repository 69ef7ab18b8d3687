//! Per-document and per-run outcome summaries.

use std::fmt;

use crate::parser::ParseFault;

/// A note the store refused or could not be asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFailure {
    /// Short label identifying the note
    pub note: String,
    /// Message as reported, verbatim from the store where available
    pub message: String,
}

/// What one document pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub path: String,
    /// The content hash matched and nothing was sent
    pub up_to_date: bool,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Notes the duplicate policy kept out of the store
    pub skipped: usize,
    /// Notes whose content matched the last sync
    pub unchanged: usize,
    pub failures: Vec<NoteFailure>,
    pub faults: Vec<ParseFault>,
    /// Set when the store became unreachable mid-pass
    pub aborted: Option<String>,
}

impl DocumentReport {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// No failures, faults or abort: the pass may be recorded as complete.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.faults.is_empty() && self.aborted.is_none()
    }

    pub(crate) fn fail(&mut self, note: impl Into<String>, message: impl Into<String>) {
        self.failures.push(NoteFailure {
            note: note.into(),
            message: message.into(),
        });
    }
}

/// Totals over every document in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub documents: usize,
    pub up_to_date: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub faults: usize,
    pub aborted: usize,
}

impl RunSummary {
    pub fn add(&mut self, report: &DocumentReport) {
        self.documents += 1;
        self.up_to_date += usize::from(report.up_to_date);
        self.created += report.created;
        self.updated += report.updated;
        self.deleted += report.deleted;
        self.skipped += report.skipped;
        self.unchanged += report.unchanged;
        self.failed += report.failures.len();
        self.faults += report.faults.len();
        self.aborted += usize::from(report.aborted.is_some());
    }

    pub const fn has_problems(&self) -> bool {
        self.failed > 0 || self.faults > 0 || self.aborted > 0
    }
}

impl<'a> FromIterator<&'a DocumentReport> for RunSummary {
    fn from_iter<I: IntoIterator<Item = &'a DocumentReport>>(reports: I) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.add(report);
        }
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} documents ({} up to date): {} created, {} updated, {} deleted, {} skipped, {} unchanged, {} failed",
            self.documents,
            self.up_to_date,
            self.created,
            self.updated,
            self.deleted,
            self.skipped,
            self.unchanged,
            self.failed
        )?;
        if self.faults > 0 {
            write!(formatter, ", {} parse faults", self.faults)?;
        }
        if self.aborted > 0 {
            write!(formatter, ", {} aborted", self.aborted)?;
        }
        Ok(())
    }
}
