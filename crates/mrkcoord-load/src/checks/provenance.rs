//! Source/display and genome build novelty

use std::collections::HashSet;

use crate::record::CoordinateRecord;
use crate::reference::ReferenceIndex;
use crate::report::{Report, ReportKind};

use super::CheckResult;

/// Distinct `source/display` values in first-seen order
pub fn source_displays(records: &[CoordinateRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(CoordinateRecord::source_display)
        .filter(|sd| seen.insert(sd.clone()))
        .collect()
}

/// `source/display` values with no matching coordinate collection
pub fn source_display_novelty(records: &[CoordinateRecord], index: &ReferenceIndex) -> CheckResult {
    let mut report = Report::new(ReportKind::SourceDisplay);
    for source_display in source_displays(records) {
        if !index.has_collection(&source_display) {
            report.push([source_display]);
        }
    }
    CheckResult::new(report)
}

/// The input build, when no coordinate map uses it yet
pub fn build_novelty(build: &str, index: &ReferenceIndex) -> CheckResult {
    let mut report = Report::new(ReportKind::Build);
    if !index.has_build(build) {
        report.push([build]);
    }
    CheckResult::new(report)
}
