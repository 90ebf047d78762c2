//! Marker identifier checks: invalid, secondary and non-miRNA markers

use crate::record::CoordinateRecord;
use crate::reference::{
    ReferenceIndex, LOADABLE_STATUS_KEYS, MARKER_LIKE_MGI_TYPES, MARKER_MGI_TYPE, MGI_LOGICAL_DB,
    MIRNA_FEATURE_TYPE,
};
use crate::report::{Report, ReportKind};

use super::{distinct_ids, sorted_by_id, CheckResult};

/// Why an identifier cannot carry a coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMarker {
    /// No accession at all
    Missing,
    /// MGI ID of some other kind of object
    NonMarker { object_type: String },
    /// Marker is neither official nor interim
    BadStatus { object_type: String, status: String },
}

impl InvalidMarker {
    pub fn reason(&self) -> &'static str {
        match self {
            InvalidMarker::Missing => "MGI ID does not exist",
            InvalidMarker::NonMarker { .. } => "MGI ID exists for non-marker",
            InvalidMarker::BadStatus { .. } => "Marker status is invalid",
        }
    }
}

/// Classify one identifier; existence is checked first, then object type,
/// then marker status
pub fn classify(id: &str, index: &ReferenceIndex) -> Option<InvalidMarker> {
    let accessions = index.accessions(id);
    if accessions.is_empty() {
        return Some(InvalidMarker::Missing);
    }

    let mgi_ids = accessions.iter().filter(|a| a.logical_db_key == MGI_LOGICAL_DB);
    let is_marker = accessions
        .iter()
        .any(|a| a.logical_db_key == MGI_LOGICAL_DB && a.mgi_type_key == MARKER_MGI_TYPE);
    if !is_marker {
        if let Some(other) = mgi_ids
            .clone()
            .find(|a| !MARKER_LIKE_MGI_TYPES.contains(&a.mgi_type_key))
        {
            return Some(InvalidMarker::NonMarker {
                object_type: other.mgi_type.clone(),
            });
        }
    }

    let marker = index.marker(id)?;
    if LOADABLE_STATUS_KEYS.contains(&marker.status_key) {
        return None;
    }
    let object_type = mgi_ids
        .clone()
        .find(|a| a.mgi_type_key == MARKER_MGI_TYPE)
        .map(|a| a.mgi_type.clone())
        .unwrap_or_default();
    Some(InvalidMarker::BadStatus {
        object_type,
        status: marker.status.clone(),
    })
}

/// Identifiers that do not exist, belong to a non-marker object, or name a
/// marker that is not official or interim; one row per identifier, rejected
pub fn invalid_markers(staged: &[&CoordinateRecord], index: &ReferenceIndex) -> CheckResult {
    let mut report = Report::new(ReportKind::InvalidMarker);
    let mut rejected = Vec::new();

    for id in distinct_ids(staged.iter().copied()) {
        let Some(invalid) = classify(id, index) else {
            continue;
        };
        let (object_type, status) = match &invalid {
            InvalidMarker::Missing => ("", ""),
            InvalidMarker::NonMarker { object_type } => (object_type.as_str(), ""),
            InvalidMarker::BadStatus {
                object_type,
                status,
            } => (object_type.as_str(), status.as_str()),
        };
        report.push([id, object_type, status, invalid.reason()]);
        rejected.push(id.to_string());
    }

    CheckResult::rejecting(report, rejected)
}

/// Identifiers that are secondary MGI IDs of a marker, with the preferred ID
/// to use instead
pub fn secondary_markers(staged: &[&CoordinateRecord], index: &ReferenceIndex) -> CheckResult {
    let mut report = Report::new(ReportKind::SecondaryMarker);

    for id in distinct_ids(staged.iter().copied()) {
        let Some(marker) = index.marker(id).filter(|m| !m.preferred) else {
            continue;
        };
        match marker.primary_id.as_deref() {
            Some(primary) if primary != id => {
                report.push([id, marker.symbol.as_str(), primary]);
            },
            _ => {},
        }
    }

    CheckResult::new(report)
}

/// Records carrying a miRBase ID whose marker is not a miRNA gene
pub fn non_mirna_markers(staged: &[&CoordinateRecord], index: &ReferenceIndex) -> CheckResult {
    let mut report = Report::new(ReportKind::NonMirnaMarker);

    for record in sorted_by_id(staged) {
        if !record.has_mirbase_id() || index.preferred_marker(&record.mgi_id).is_none() {
            continue;
        }
        for term in index.feature_types(&record.mgi_id) {
            if term != MIRNA_FEATURE_TYPE {
                report.push([
                    record.mgi_id.as_str(),
                    term.as_str(),
                    record.external_ids_raw.as_str(),
                ]);
            }
        }
    }

    CheckResult::new(report)
}
