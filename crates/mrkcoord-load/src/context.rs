//! Run-scoped QC state
//!
//! The rejection set and the collected reports live in a [`RunContext`]
//! owned by the pipeline and passed explicitly to whoever needs them.

use std::collections::BTreeSet;

use tracing::info;

use crate::checks::CheckResult;
use crate::report::{Report, ReportKind};

/// Primary identifiers whose records are kept out of the load-ready file
///
/// Identifiers can only be added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionSet {
    ids: BTreeSet<String>,
}

impl RejectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identifier; returns whether it was new
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> Extend<S> for RejectionSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No check produced a discrepancy row
    Clean,
    /// At least one report has rows that need attention
    Discrepancies,
}

impl RunOutcome {
    /// Process exit status: 0 clean, 2 discrepancies
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::Discrepancies => 2,
        }
    }
}

/// Accumulated state of one QC run
#[derive(Debug, Clone)]
pub struct RunContext {
    timestamp: String,
    rejections: RejectionSet,
    reports: Vec<Report>,
}

impl RunContext {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            rejections: RejectionSet::new(),
            reports: Vec::new(),
        }
    }

    /// Timestamp printed under every report title
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Record the outcome of one check
    pub fn absorb(&mut self, result: CheckResult) {
        let CheckResult { report, rejected } = result;
        let newly_rejected = rejected
            .into_iter()
            .filter(|id| self.rejections.insert(id.clone()))
            .count();

        info!(
            check = report.kind.title(),
            rows = report.count(),
            rejected = newly_rejected,
            "Check finished"
        );
        self.reports.push(report);
    }

    pub fn rejections(&self) -> &RejectionSet {
        &self.rejections
    }

    pub fn is_rejected(&self, id: &str) -> bool {
        self.rejections.contains(id)
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn report(&self, kind: ReportKind) -> Option<&Report> {
        self.reports.iter().find(|r| r.kind == kind)
    }

    /// Total discrepancy rows across all reports
    pub fn discrepancy_count(&self) -> usize {
        self.reports.iter().map(Report::count).sum()
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.discrepancy_count() > 0 {
            RunOutcome::Discrepancies
        } else {
            RunOutcome::Clean
        }
    }
}
