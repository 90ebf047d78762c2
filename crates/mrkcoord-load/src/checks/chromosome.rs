//! Chromosome validity and marker/feature chromosome discrepancies

use std::collections::BTreeSet;

use crate::record::CoordinateRecord;
use crate::reference::ReferenceIndex;
use crate::report::{Report, ReportKind};

use super::{sorted_by_id, CheckResult};

/// Records of known markers whose chromosome is not a mouse chromosome
///
/// Reported identifiers are rejected and also returned as the exclusion set
/// for [`chromosome_discrepancies`].
pub fn invalid_chromosomes(
    staged: &[&CoordinateRecord],
    index: &ReferenceIndex,
) -> (CheckResult, BTreeSet<String>) {
    let mut report = Report::new(ReportKind::InvalidChromosome);
    let mut excluded = BTreeSet::new();

    for record in sorted_by_id(staged) {
        let Some(marker) = index.preferred_marker(&record.mgi_id) else {
            continue;
        };
        if index.is_valid_chromosome(&record.chromosome) {
            continue;
        }
        report.push([
            record.mgi_id.as_str(),
            marker.symbol.as_str(),
            record.chromosome.as_str(),
        ]);
        excluded.insert(record.mgi_id.clone());
    }

    let result = CheckResult::rejecting(report, excluded.iter().cloned());
    (result, excluded)
}

/// Records whose chromosome differs from the marker's chromosome
pub fn chromosome_discrepancies(
    staged: &[&CoordinateRecord],
    index: &ReferenceIndex,
    excluded: &BTreeSet<String>,
) -> CheckResult {
    let mut report = Report::new(ReportKind::ChromosomeDiscrepancy);

    for record in sorted_by_id(staged) {
        if excluded.contains(&record.mgi_id) {
            continue;
        }
        let Some(marker) = index.preferred_marker(&record.mgi_id) else {
            continue;
        };
        if marker.chromosome != record.chromosome {
            report.push([
                record.mgi_id.as_str(),
                marker.symbol.as_str(),
                marker.chromosome.as_str(),
                record.chromosome.as_str(),
            ]);
        }
    }

    CheckResult::new(report)
}
