//! QC checks
//!
//! Every check is a pure function of the input records and the
//! [`ReferenceIndex`](crate::reference::ReferenceIndex) and returns a
//! [`CheckResult`]. Checks do not see each other's results, with one
//! exception: the chromosome discrepancy check skips identifiers the
//! invalid-chromosome check already reported.

pub mod association;
pub mod chromosome;
pub mod marker;
pub mod provenance;

use std::collections::BTreeSet;

use crate::parser::check_coordinates;
use crate::record::CoordinateRecord;
use crate::report::{Report, ReportKind};

/// Findings of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub report: Report,
    /// Identifiers to keep out of the load-ready file
    pub rejected: BTreeSet<String>,
}

impl CheckResult {
    /// A reporting-only result
    pub fn new(report: Report) -> Self {
        Self {
            report,
            rejected: BTreeSet::new(),
        }
    }

    pub fn rejecting<I>(report: Report, rejected: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            report,
            rejected: rejected.into_iter().collect(),
        }
    }
}

/// Identifiers of `records`, deduplicated and sorted
pub(crate) fn distinct_ids<'a, I>(records: I) -> BTreeSet<&'a str>
where
    I: IntoIterator<Item = &'a CoordinateRecord>,
{
    records.into_iter().map(|r| r.mgi_id.as_str()).collect()
}

/// Records in identifier order, input order within one identifier
pub(crate) fn sorted_by_id<'a>(records: &[&'a CoordinateRecord]) -> Vec<&'a CoordinateRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.mgi_id.cmp(&b.mgi_id));
    sorted
}

/// Split records into those fit for staging and the coordinate/strand report
///
/// A record with any coordinate or strand problem is reported once per
/// problem, rejected, and not staged.
pub fn coordinate_strand(records: &[CoordinateRecord]) -> (CheckResult, Vec<&CoordinateRecord>) {
    let mut report = Report::new(ReportKind::InvalidCoordinateStrand);
    let mut rejected = BTreeSet::new();
    let mut staged = Vec::with_capacity(records.len());

    for record in records {
        let issues = check_coordinates(record);
        if issues.is_empty() {
            staged.push(record);
            continue;
        }
        for issue in issues {
            report.push([
                record.mgi_id.as_str(),
                record.start.as_str(),
                record.end.as_str(),
                record.strand.as_str(),
                record.source.as_str(),
                issue.reason(),
            ]);
        }
        rejected.insert(record.mgi_id.clone());
    }

    (CheckResult { report, rejected }, staged)
}
