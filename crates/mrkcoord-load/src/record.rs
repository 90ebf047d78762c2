//! Coordinate feed records
//!
//! One [`CoordinateRecord`] per data line of the input feed. Fields are
//! trimmed once, here, and the record is never mutated afterwards; rejection
//! is tracked by identifier in the run context.

use std::borrow::Cow;
use std::io::BufRead;

/// Field separator of the data lines
pub const FIELD_SEPARATOR: char = '\t';

/// Separator of the external identifier list
pub const EXTERNAL_ID_SEPARATOR: char = ',';

/// Number of fields in the current feed layout
pub const FEED_COLUMNS: usize = 8;

/// A single marker coordinate from the input feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateRecord {
    /// 1-based line number in the input file (the header is line 1)
    pub line_number: usize,
    /// Primary MGI identifier of the marker
    pub mgi_id: String,
    pub chromosome: String,
    /// Raw start coordinate; may be empty or malformed
    pub start: String,
    /// Raw end coordinate; may be empty or malformed
    pub end: String,
    /// Raw strand; empty means "unknown" and is allowed
    pub strand: String,
    /// Collection (provider) name
    pub source: String,
    /// Collection abbreviation used for display
    pub display: String,
    /// The external identifier field exactly as trimmed from the input
    pub external_ids_raw: String,
    /// Parsed external identifiers (miRBase IDs), in input order, no blanks
    pub external_ids: Vec<String>,
}

impl CoordinateRecord {
    /// Tokenize one data line
    ///
    /// Returns `None` for blank lines. Trailing fields missing from older
    /// feed layouts are treated as empty.
    pub fn from_line(line: &str, line_number: usize) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return None;
        }

        let mut fields = line.split(FIELD_SEPARATOR).map(str::trim);
        let mut next = || fields.next().unwrap_or_default().to_string();

        let mgi_id = next();
        let chromosome = next();
        let start = next();
        let end = next();
        let strand = next();
        let source = next();
        let display = next();
        let external_ids_raw = next();
        let external_ids = split_external_ids(&external_ids_raw);

        Some(Self {
            line_number,
            mgi_id,
            chromosome,
            start,
            end,
            strand,
            source,
            display,
            external_ids_raw,
            external_ids,
        })
    }

    /// `source/display` key used by the provenance checks
    pub fn source_display(&self) -> String {
        format!("{}/{}", self.source, self.display)
    }

    /// Whether the record carries a miRBase-style identifier
    pub fn has_mirbase_id(&self) -> bool {
        self.external_ids_raw.contains("MI")
    }
}

/// Split a comma-separated identifier list, trimming each entry
///
/// An empty field yields an empty list, never a list holding `""`.
pub fn split_external_ids(raw: &str) -> Vec<String> {
    raw.split(EXTERNAL_ID_SEPARATOR)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode a raw input line, falling back to Latin-1 for non UTF-8 bytes
pub fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Lines of a reader decoded with [`decode_line`], terminators kept
pub struct DecodedLines<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> Iterator for DecodedLines<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => Some(Ok(decode_line(&self.buffer).into_owned())),
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn decoded_lines<R: BufRead>(reader: R) -> DecodedLines<R> {
    DecodedLines {
        reader,
        buffer: Vec::new(),
    }
}

/// Primary identifier of a raw data line, as the emitter and splitter see it
pub fn line_identifier(line: &str) -> &str {
    line.split(FIELD_SEPARATOR).next().unwrap_or_default().trim()
}
