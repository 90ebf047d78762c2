//! QC reports
//!
//! Every check produces a [`Report`]: a fixed report kind plus its rows.
//! Reports are rendered as fixed-width text tables:
//!
//! ```text
//!                           Invalid Marker Report
//!                         (Mon Jan 15 10:00:00 2024)
//!
//! MGI ID        Associated Object     Marker Status         Reason
//! ------------  --------------------  --------------------  ------------------------------
//! MGI:999       Marker                withdrawn             Marker status is invalid
//!
//! Number of Rows: 1
//! ```
//!
//! Report files are opened in append mode, so one report file can collect
//! several runs of an orchestrated job. The manifest of reports with
//! discrepancies is truncated at the start of every run.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mrkcoord_common::{MrkCoordError, Result};
use tracing::debug;

/// Column separator of the rendered tables
const COLUMN_GAP: &str = "  ";

/// One column of a fixed-width report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub heading: &'static str,
    pub width: usize,
}

/// The fixed set of QC report categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportKind {
    InvalidCoordinateStrand,
    InvalidMarker,
    SecondaryMarker,
    InvalidChromosome,
    ChromosomeDiscrepancy,
    NonMirnaMarker,
    AssociationDeletion,
    DuplicateIdentifier,
    CrossOwnedIdentifier,
    SourceDisplay,
    Build,
}

impl ReportKind {
    /// All kinds, in the order the reports are produced and listed
    pub const ALL: [ReportKind; 11] = [
        ReportKind::InvalidCoordinateStrand,
        ReportKind::InvalidMarker,
        ReportKind::SecondaryMarker,
        ReportKind::InvalidChromosome,
        ReportKind::ChromosomeDiscrepancy,
        ReportKind::NonMirnaMarker,
        ReportKind::AssociationDeletion,
        ReportKind::DuplicateIdentifier,
        ReportKind::CrossOwnedIdentifier,
        ReportKind::SourceDisplay,
        ReportKind::Build,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::InvalidCoordinateStrand => "Invalid Coordinate and Strand Report",
            ReportKind::InvalidMarker => "Invalid Marker Report",
            ReportKind::SecondaryMarker => "Secondary Marker Report",
            ReportKind::InvalidChromosome => "Invalid Chromosome Report",
            ReportKind::ChromosomeDiscrepancy => "Chromosome Discrepancy Report",
            ReportKind::NonMirnaMarker => "Non-miRNA Marker Report",
            ReportKind::AssociationDeletion => "miRBase/Marker Deletion Report",
            ReportKind::DuplicateIdentifier => "Duplicate miRBase ID Report",
            ReportKind::CrossOwnedIdentifier => {
                "miRBase IDs in the Input Associated with Different Markers in MGI Report"
            },
            ReportKind::SourceDisplay => "Source/Display in Input, not in Database",
            ReportKind::Build => "Build Report",
        }
    }

    /// Width the title and timestamp are centered in
    pub fn page_width(self) -> usize {
        match self {
            ReportKind::InvalidCoordinateStrand
            | ReportKind::InvalidMarker
            | ReportKind::SourceDisplay
            | ReportKind::Build => 110,
            ReportKind::InvalidChromosome | ReportKind::ChromosomeDiscrepancy => 96,
            _ => 108,
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            ReportKind::InvalidCoordinateStrand => &[
                Column { heading: "MGI ID", width: 12 },
                Column { heading: "Start Coordinate", width: 20 },
                Column { heading: "End Coordinate", width: 20 },
                Column { heading: "Strand", width: 10 },
                Column { heading: "Provider", width: 20 },
                Column { heading: "Reason", width: 30 },
            ],
            ReportKind::InvalidMarker => &[
                Column { heading: "MGI ID", width: 12 },
                Column { heading: "Associated Object", width: 20 },
                Column { heading: "Marker Status", width: 20 },
                Column { heading: "Reason", width: 30 },
            ],
            ReportKind::SecondaryMarker => &[
                Column { heading: "Secondary MGI ID", width: 16 },
                Column { heading: "Marker Symbol", width: 50 },
                Column { heading: "Primary MGI ID", width: 16 },
            ],
            ReportKind::InvalidChromosome => &[
                Column { heading: "MGI ID", width: 20 },
                Column { heading: "Marker Symbol", width: 50 },
                Column { heading: "Invalid Chr", width: 10 },
            ],
            ReportKind::ChromosomeDiscrepancy => &[
                Column { heading: "MGI ID", width: 20 },
                Column { heading: "Marker Symbol", width: 50 },
                Column { heading: "Marker Chr", width: 10 },
                Column { heading: "Feature Chr", width: 10 },
            ],
            ReportKind::NonMirnaMarker => &[
                Column { heading: "MGI ID", width: 16 },
                Column { heading: "Feature Type", width: 50 },
                Column { heading: "miRBase ID", width: 16 },
            ],
            ReportKind::AssociationDeletion => &[
                Column { heading: "Input MGI ID", width: 16 },
                Column { heading: "Input Symbol", width: 16 },
                Column { heading: "miRBase/Marker Associations To Be Added", width: 60 },
                Column { heading: "miRBase/Marker Associations To Be Deleted", width: 60 },
            ],
            ReportKind::DuplicateIdentifier => &[
                Column { heading: "Input miRBase ID", width: 16 },
                Column { heading: "Associated MGI IDs", width: 50 },
            ],
            ReportKind::CrossOwnedIdentifier => &[
                Column { heading: "Input miRBase ID", width: 16 },
                Column { heading: "Input MGI IDs", width: 40 },
                Column { heading: "Database MGI IDs", width: 40 },
            ],
            ReportKind::SourceDisplay => &[Column { heading: "Source/Display Not in Database", width: 60 }],
            ReportKind::Build => &[Column { heading: "Build Value Not in Database", width: 30 }],
        }
    }

    /// Environment variable naming the report file
    pub fn env_var(self) -> &'static str {
        match self {
            ReportKind::InvalidCoordinateStrand => "INVALID_COORD_STRAND_RPT",
            ReportKind::InvalidMarker => "INVALID_MARKER_RPT",
            ReportKind::SecondaryMarker => "SEC_MARKER_RPT",
            ReportKind::InvalidChromosome => "INVALID_CHR_RPT",
            ReportKind::ChromosomeDiscrepancy => "CHR_DISCREP_RPT",
            ReportKind::NonMirnaMarker => "NON_MIRNA_MARKER_RPT",
            ReportKind::AssociationDeletion => "MIRBASE_DELETE_RPT",
            ReportKind::DuplicateIdentifier => "MIRBASE_DUP_RPT",
            ReportKind::CrossOwnedIdentifier => "MIRBASE_OTHER_MKR_RPT",
            ReportKind::SourceDisplay => "SOURCE_DISPLAY_RPT",
            ReportKind::Build => "BUILD_RPT",
        }
    }

    /// File name used when the report directory supplies the location
    pub fn default_file_name(self) -> &'static str {
        match self {
            ReportKind::InvalidCoordinateStrand => "invalid_coord_strand.rpt",
            ReportKind::InvalidMarker => "invalid_marker.rpt",
            ReportKind::SecondaryMarker => "sec_marker.rpt",
            ReportKind::InvalidChromosome => "invalid_chr.rpt",
            ReportKind::ChromosomeDiscrepancy => "chr_discrep.rpt",
            ReportKind::NonMirnaMarker => "non_mirna_marker.rpt",
            ReportKind::AssociationDeletion => "mirbase_delete.rpt",
            ReportKind::DuplicateIdentifier => "mirbase_dup.rpt",
            ReportKind::CrossOwnedIdentifier => "mirbase_other_mkr.rpt",
            ReportKind::SourceDisplay => "source_display.rpt",
            ReportKind::Build => "build.rpt",
        }
    }
}

/// Findings of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }

    /// Append a row; cells beyond the report's columns are ignored
    pub fn push<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Render the report as a fixed-width table
    pub fn render(&self, timestamp: &str) -> String {
        let width = self.kind.page_width();
        let columns = self.kind.columns();

        let mut out = String::new();
        out.push_str(&format!("{:^width$}\n", self.kind.title()));
        out.push_str(&format!("{:^width$}\n\n", format!("({timestamp})")));

        out.push_str(&render_line(columns, columns.iter().map(|c| c.heading)));
        out.push_str(&render_line(
            columns,
            columns.iter().map(|c| "-".repeat(c.width)),
        ));
        for row in &self.rows {
            out.push_str(&render_line(columns, row.iter()));
        }

        out.push_str(&format!("\nNumber of Rows: {}\n", self.count()));
        out
    }
}

fn render_line<I, S>(columns: &[Column], cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cells = cells.into_iter();
    let line = columns
        .iter()
        .map(|column| {
            let cell = cells.next();
            let text: &str = match &cell {
                Some(c) => c.as_ref(),
                None => "",
            };
            format!("{:<width$}", text, width = column.width)
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    format!("{line}\n")
}

/// Report file locations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    paths: Vec<(ReportKind, PathBuf)>,
    /// File listing the reports that contained discrepancies
    pub manifest: PathBuf,
}

impl ReportPaths {
    /// Place every report in `dir` under its default file name
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            paths: ReportKind::ALL
                .iter()
                .map(|&kind| (kind, dir.join(kind.default_file_name())))
                .collect(),
            manifest: dir.join("rpt_names.rpt"),
        }
    }

    /// Override the location of one report
    pub fn set(&mut self, kind: ReportKind, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Some(entry) = self.paths.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = path;
        }
    }

    pub fn path(&self, kind: ReportKind) -> &Path {
        self.paths
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.as_path())
            .unwrap_or_else(|| Path::new(kind.default_file_name()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReportKind, &Path)> {
        self.paths.iter().map(|(k, p)| (*k, p.as_path()))
    }
}

/// Open report files for one run
///
/// All files are opened up front so a bad path fails the run before any
/// work is done.
pub struct ReportWriter {
    files: Vec<(ReportKind, PathBuf, BufWriter<File>)>,
    manifest_path: PathBuf,
    manifest: BufWriter<File>,
}

impl ReportWriter {
    pub fn open(paths: &ReportPaths) -> Result<Self> {
        let mut files = Vec::new();
        for (kind, path) in paths.iter() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| MrkCoordError::output(path, e))?;
            files.push((kind, path.to_path_buf(), BufWriter::new(file)));
        }

        let manifest = File::create(&paths.manifest)
            .map_err(|e| MrkCoordError::output(&paths.manifest, e))?;

        Ok(Self {
            files,
            manifest_path: paths.manifest.clone(),
            manifest: BufWriter::new(manifest),
        })
    }

    /// Append the rendered report to its file
    ///
    /// Returns the report's path when it contained discrepancies.
    pub fn write(&mut self, report: &Report, timestamp: &str) -> Result<Option<PathBuf>> {
        let (_, path, file) = self
            .files
            .iter_mut()
            .find(|(kind, _, _)| *kind == report.kind)
            .ok_or_else(|| {
                MrkCoordError::Config(format!("no report file for {:?}", report.kind))
            })?;

        file.write_all(report.render(timestamp).as_bytes())
            .map_err(|e| MrkCoordError::output(path.as_path(), e))?;
        debug!(report = report.kind.title(), rows = report.count(), "Wrote report");

        Ok(report.has_discrepancies().then(|| path.clone()))
    }

    /// Write the manifest and flush every file
    pub fn finish(mut self, manifest: &[PathBuf]) -> Result<()> {
        for path in manifest {
            writeln!(self.manifest, "{}", path.display())
                .map_err(|e| MrkCoordError::output(&self.manifest_path, e))?;
        }
        self.manifest
            .flush()
            .map_err(|e| MrkCoordError::output(&self.manifest_path, e))?;

        for (_, path, file) in &mut self.files {
            file.flush()
                .map_err(|e| MrkCoordError::output(path.as_path(), e))?;
        }
        Ok(())
    }
}
