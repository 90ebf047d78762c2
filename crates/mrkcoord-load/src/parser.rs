//! Coordinate feed parser
//!
//! Reads the semicolon-delimited metadata header and tokenizes the
//! tab-delimited data lines that follow it. Also holds the syntactic
//! coordinate/strand checks, which run before anything is staged because
//! malformed coordinates cannot go into the integer columns of the staging
//! table.
//!
//! # Format
//! ```text
//! build=GRCm39; provider=NCBI; date=2024-01-15
//! MGI:101\t5\t1000\t2000\t+\tNCBI\tNCBI Gene\tMI0000001
//! ```

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use mrkcoord_common::{MrkCoordError, Result};
use tracing::debug;

use crate::record::{decode_line, CoordinateRecord};

/// Metadata from the first line of the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHeader {
    /// `key=value` pairs in header order, keys lower-cased
    entries: Vec<(String, String)>,
    /// Genome build the coordinates refer to
    pub build: String,
}

impl FeedHeader {
    /// Parse a header line such as `build=GRCm39; provider=NCBI`
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();

        let entries: Vec<(String, String)> = line
            .split(';')
            .filter_map(|token| {
                let (key, value) = token.split_once('=')?;
                Some((key.trim().to_lowercase(), value.trim().to_string()))
            })
            .collect();

        let build = entries
            .iter()
            .find(|(key, _)| key == "build")
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                MrkCoordError::Parse(format!("input header has no build=<value> entry: {line:?}"))
            })?;

        Ok(Self { entries, build })
    }

    /// Look up a header value by (case-insensitive) key
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parsed coordinate feed
#[derive(Debug, Clone)]
pub struct CoordinateFeed {
    pub header: FeedHeader,
    /// Every non-blank data line, in input order
    pub records: Vec<CoordinateRecord>,
}

impl CoordinateFeed {
    /// Read and tokenize the feed at `path`
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| MrkCoordError::input(path, e))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read and tokenize a feed from any buffered reader
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut buffer = Vec::new();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Err(MrkCoordError::Parse("input file is empty".to_string()));
        }
        let header = FeedHeader::parse(&decode_line(&buffer))?;
        debug!(build = %header.build, "Parsed input header");

        let mut records = Vec::new();
        let mut line_number = 1;
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_number += 1;
            if let Some(record) = CoordinateRecord::from_line(&decode_line(&buffer), line_number) {
                records.push(record);
            }
        }

        debug!(records = records.len(), "Tokenized input records");
        Ok(Self { header, records })
    }
}

/// A syntactic problem with the coordinates or strand of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateIssue {
    InvalidStart,
    InvalidEnd,
    StartAfterEnd,
    InvalidStrand,
}

impl CoordinateIssue {
    /// Reason text used in the coordinate/strand report
    pub fn reason(self) -> &'static str {
        match self {
            CoordinateIssue::InvalidStart => "Invalid start coordinate",
            CoordinateIssue::InvalidEnd => "Invalid end coordinate",
            CoordinateIssue::StartAfterEnd => "Start coordinate > end coordinate",
            CoordinateIssue::InvalidStrand => "Invalid strand",
        }
    }
}

fn is_digits(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two all-digit strings numerically without overflowing
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Check coordinates and strand of one record
///
/// Every failing condition is returned separately. Empty coordinates and an
/// empty strand pass: both are optional in the feed.
pub fn check_coordinates(record: &CoordinateRecord) -> Vec<CoordinateIssue> {
    let mut issues = Vec::new();

    let start_ok = is_digits(&record.start);
    let end_ok = is_digits(&record.end);
    if !start_ok {
        issues.push(CoordinateIssue::InvalidStart);
    }
    if !end_ok {
        issues.push(CoordinateIssue::InvalidEnd);
    }

    if start_ok
        && end_ok
        && !record.start.is_empty()
        && !record.end.is_empty()
        && compare_digits(&record.start, &record.end) == Ordering::Greater
    {
        issues.push(CoordinateIssue::StartAfterEnd);
    }

    if !matches!(record.strand.as_str(), "+" | "-" | "") {
        issues.push(CoordinateIssue::InvalidStrand);
    }

    issues
}
