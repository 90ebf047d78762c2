//! miRBase association reconciliation
//!
//! Compares the external IDs each input marker claims with the IDs the
//! datastore currently associates with it, and looks for external IDs that
//! are claimed by several input markers or owned by markers the input does
//! not mention.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::CoordinateRecord;
use crate::reference::{AssociationDeletion, ReferenceIndex};
use crate::report::{Report, ReportKind};

use super::CheckResult;

/// Association changes the load would make for one marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDiff {
    pub mgi_id: String,
    pub symbol: String,
    /// In the input, not in the datastore
    pub added: BTreeSet<String>,
    /// In the datastore, not in the input
    pub deleted: BTreeSet<String>,
    deletions: Vec<AssociationDeletion>,
}

impl AssociationDiff {
    /// Accession rows to remove for the deleted IDs
    pub fn deletions(&self) -> &[AssociationDeletion] {
        &self.deletions
    }
}

/// Input external IDs per marker, over every record given
pub fn input_associations<'a, I>(records: I) -> BTreeMap<String, BTreeSet<String>>
where
    I: IntoIterator<Item = &'a CoordinateRecord>,
{
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in records {
        map.entry(record.mgi_id.clone())
            .or_default()
            .extend(record.external_ids.iter().cloned());
    }
    map
}

/// Diff every staged marker that has associations in the datastore
///
/// Markers unknown to the datastore, or without associations there, have
/// nothing that could be deleted and are skipped.
pub fn diff_associations(
    staged: &[&CoordinateRecord],
    index: &ReferenceIndex,
) -> Vec<AssociationDiff> {
    input_associations(staged.iter().copied())
        .into_iter()
        .filter_map(|(mgi_id, input_ids)| {
            let current = index.associations(&mgi_id)?;
            let db_ids = current.ids();

            let added: BTreeSet<String> = input_ids.difference(&db_ids).cloned().collect();
            let deleted: BTreeSet<String> = db_ids.difference(&input_ids).cloned().collect();
            let deletions = deleted
                .iter()
                .filter_map(|external_id| {
                    current
                        .external_ids
                        .get(external_id)
                        .map(|&accession_key| AssociationDeletion {
                            accession_key,
                            mgi_id: mgi_id.clone(),
                            external_id: external_id.clone(),
                        })
                })
                .collect();

            Some(AssociationDiff {
                symbol: current.symbol.clone(),
                mgi_id,
                added,
                deleted,
                deletions,
            })
        })
        .collect()
}

/// Markers about to lose associations
pub fn deletion_report(diffs: &[AssociationDiff]) -> CheckResult {
    let mut report = Report::new(ReportKind::AssociationDeletion);
    for diff in diffs.iter().filter(|d| !d.deleted.is_empty()) {
        report.push([
            diff.mgi_id.clone(),
            diff.symbol.clone(),
            join(&diff.added, ", "),
            join(&diff.deleted, ", "),
        ]);
    }
    CheckResult::new(report)
}

/// External IDs claimed by more than one marker in the input
pub fn duplicate_ids(records: &[CoordinateRecord]) -> CheckResult {
    let mut report = Report::new(ReportKind::DuplicateIdentifier);
    for (external_id, markers) in claimants(records) {
        if markers.len() > 1 {
            report.push([external_id, join(&markers, ",")]);
        }
    }
    CheckResult::new(report)
}

/// External IDs the datastore associates with markers the input does not
/// claim them for
pub fn cross_owned_ids(records: &[CoordinateRecord], index: &ReferenceIndex) -> CheckResult {
    let mut report = Report::new(ReportKind::CrossOwnedIdentifier);
    for (external_id, markers) in claimants(records) {
        let Some(owners) = index.owners(&external_id) else {
            continue;
        };
        let others: BTreeSet<String> = owners.difference(&markers).cloned().collect();
        if !others.is_empty() {
            report.push([external_id, join(&markers, ", "), join(&others, ", ")]);
        }
    }
    CheckResult::new(report)
}

/// Input markers per external ID
fn claimants(records: &[CoordinateRecord]) -> BTreeMap<String, BTreeSet<String>> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in records {
        for external_id in &record.external_ids {
            map.entry(external_id.clone())
                .or_default()
                .insert(record.mgi_id.clone());
        }
    }
    map
}

fn join(ids: &BTreeSet<String>, separator: &str) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(separator)
}
