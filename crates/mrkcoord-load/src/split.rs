//! Partition of a load-ready feed into per-collection coordinate files
//!
//! Each collection (`name~abbreviation`) gets its own file holding the first
//! five columns of its lines, in input order. The generated file names are
//! listed in a separate file, and every line carrying external IDs becomes a
//! row of the miRBase association file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use mrkcoord_common::{MrkCoordError, Result};
use tracing::{debug, info};

use crate::record::{decoded_lines, FEED_COLUMNS, FIELD_SEPARATOR};
use crate::staging::tab_writer;

/// Columns kept in the per-collection files
pub const COORDINATE_COLUMNS: usize = 5;

/// Header of the association file
pub const ASSOCIATION_HEADER: [&str; 2] = ["MGI", "miRBase"];

/// Paths of a split run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    /// Load-ready feed to split
    pub input: PathBuf,
    /// miRBase association file
    pub association_file: PathBuf,
    /// Prefix of the per-collection files
    pub file_root: PathBuf,
    /// Where the generated file names are listed
    pub file_list: PathBuf,
}

/// Lines of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionGroup {
    /// `name~abbreviation`
    pub key: String,
    pub rows: Vec<Vec<String>>,
}

impl CollectionGroup {
    /// File name for this collection under `root`
    pub fn file_name(&self, root: &Path) -> PathBuf {
        let mut name = root.as_os_str().to_owned();
        name.push(".");
        name.push(self.key.replace(' ', "_"));
        PathBuf::from(name)
    }
}

/// Parsed contents of a load-ready feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitFeed {
    /// Collections in first-seen order
    pub groups: Vec<CollectionGroup>,
    /// `(identifier, external IDs)` for lines with external IDs
    pub associations: Vec<(String, String)>,
}

impl SplitFeed {
    /// Group the data lines of a load-ready feed; the first line is a header
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut feed = Self::default();

        for (index, line) in decoded_lines(reader).enumerate().skip(1) {
            let line = line?;
            let columns: Vec<&str> = line
                .trim_end_matches(['\n', '\r'])
                .split(FIELD_SEPARATOR)
                .collect();
            if columns.len() < FEED_COLUMNS {
                return Err(MrkCoordError::Parse(format!(
                    "line {} has {} of {FEED_COLUMNS} columns: {}",
                    index + 1,
                    columns.len(),
                    line.trim_end()
                )));
            }

            let mgi_id = columns[0].trim();
            let external_ids = columns[7].trim();
            if !external_ids.is_empty() {
                feed.associations
                    .push((mgi_id.to_string(), external_ids.to_string()));
            }

            let key = format!("{}~{}", columns[5].trim(), columns[6].trim());
            let row = columns[..COORDINATE_COLUMNS]
                .iter()
                .map(|c| c.to_string())
                .collect();
            match feed.groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.rows.push(row),
                None => feed.groups.push(CollectionGroup {
                    key,
                    rows: vec![row],
                }),
            }
        }

        Ok(feed)
    }
}

/// What a split run wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub files: Vec<PathBuf>,
    pub associations: usize,
}

/// Split `config.input` into per-collection files
pub fn split_feed(config: &SplitConfig) -> Result<SplitSummary> {
    let input = File::open(&config.input).map_err(|e| MrkCoordError::input(&config.input, e))?;
    let feed = SplitFeed::from_reader(BufReader::new(input))?;

    write_rows(
        &config.association_file,
        std::iter::once(ASSOCIATION_HEADER.map(str::to_string).to_vec()).chain(
            feed.associations
                .iter()
                .map(|(id, ids)| vec![id.clone(), ids.clone()]),
        ),
    )?;

    let mut files = Vec::with_capacity(feed.groups.len());
    for group in &feed.groups {
        let path = group.file_name(&config.file_root);
        write_rows(&path, group.rows.iter().cloned())?;
        debug!(collection = %group.key, rows = group.rows.len(), path = %path.display(), "Collection file written");
        files.push(path);
    }

    write_rows(
        &config.file_list,
        files
            .iter()
            .map(|f| vec![f.to_string_lossy().into_owned()]),
    )?;

    info!(
        collections = files.len(),
        associations = feed.associations.len(),
        "Load-ready feed split"
    );
    Ok(SplitSummary {
        files,
        associations: feed.associations.len(),
    })
}

fn write_rows<I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let file = File::create(path).map_err(|e| MrkCoordError::output(path, e))?;
    let mut writer = tab_writer(file);
    for row in rows {
        writer.write_record(&row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| MrkCoordError::output(path, e))
}

fn csv_error(path: &Path, err: csv::Error) -> MrkCoordError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => MrkCoordError::output(path, e),
        other => MrkCoordError::Parse(format!("{}: {other:?}", path.display())),
    }
}
