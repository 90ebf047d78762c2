//! Column-count sanity check of a tab-delimited feed
//!
//! Lines short of the expected column count are errors. Lines with enough
//! columns are also checked for required data, but missing data is only
//! reported.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use mrkcoord_common::{MrkCoordError, Result};
use tracing::{info, warn};

use crate::record::{decoded_lines, FIELD_SEPARATOR};

/// A problem found on one data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnIssue {
    MissingColumns { line_number: usize, columns: Vec<String> },
    MissingData { line_number: usize, columns: Vec<String> },
}

impl ColumnIssue {
    pub fn line_number(&self) -> usize {
        match self {
            Self::MissingColumns { line_number, .. } | Self::MissingData { line_number, .. } => {
                *line_number
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::MissingColumns { .. })
    }
}

/// Outcome of a column check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnReport {
    pub lines: usize,
    pub issues: Vec<ColumnIssue>,
}

impl ColumnReport {
    pub fn errors(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }

    pub fn is_ok(&self) -> bool {
        self.errors() == 0
    }
}

/// Check every data line of `path` for at least `expected` columns
pub fn check_columns(path: &Path, expected: usize) -> Result<ColumnReport> {
    let file = File::open(path).map_err(|e| MrkCoordError::input(path, e))?;
    let report = check_reader(BufReader::new(file), expected)
        .map_err(|e| MrkCoordError::input(path, e))?;

    for issue in &report.issues {
        match issue {
            ColumnIssue::MissingColumns { line_number, columns } => {
                warn!(line = line_number, found = columns.len(), expected, ?columns, "Missing column(s)");
            }
            ColumnIssue::MissingData { line_number, columns } => {
                warn!(line = line_number, ?columns, "Missing data in required column");
            }
        }
    }
    info!(
        path = %path.display(),
        lines = report.lines,
        errors = report.errors(),
        "Column check complete"
    );
    Ok(report)
}

/// Column check over any buffered reader; the first line is a header
pub fn check_reader<R: BufRead>(reader: R, expected: usize) -> std::io::Result<ColumnReport> {
    let mut report = ColumnReport::default();

    for (index, line) in decoded_lines(reader).enumerate().skip(1) {
        let line = line?;
        let line_number = index + 1;
        report.lines += 1;

        let columns: Vec<String> = line
            .trim_end_matches(['\n', '\r'])
            .split(FIELD_SEPARATOR)
            .map(str::to_string)
            .collect();

        if columns.len() < expected {
            report.issues.push(ColumnIssue::MissingColumns { line_number, columns });
        } else if !has_required_data(&columns) {
            report.issues.push(ColumnIssue::MissingData { line_number, columns });
        }
    }

    Ok(report)
}

/// A full coordinate row (strand optional), or a delete-style row carrying
/// only identifier, source and display
fn has_required_data(columns: &[String]) -> bool {
    let filled = |i: usize| columns.get(i).is_some_and(|c| !c.is_empty());

    let coordinate_row = [0, 1, 2, 3, 5, 6].into_iter().all(filled);
    let delete_row = filled(0) && (1..=4).all(|i| !filled(i)) && filled(5) && filled(6);
    coordinate_row || delete_row
}
