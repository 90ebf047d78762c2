//! Load-ready feed
//!
//! Re-reads the original input and copies the surviving lines byte for byte;
//! parsed fields are never written back. The feed is written to a temporary
//! file beside the target and only renamed into place by
//! [`PendingLoadReady::commit`]; dropping it uncommitted removes the file.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use mrkcoord_common::{MrkCoordError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::context::RejectionSet;
use crate::record::{decode_line, line_identifier};

/// Counts of one emitter run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub written: usize,
    pub dropped: usize,
}

/// A fully written load-ready feed that is not yet at its final path
#[derive(Debug)]
pub struct PendingLoadReady {
    temp: NamedTempFile,
    output: PathBuf,
    summary: EmitSummary,
}

impl PendingLoadReady {
    pub fn summary(&self) -> EmitSummary {
        self.summary
    }

    /// Rename the staged feed onto the output path
    pub fn commit(self) -> Result<EmitSummary> {
        let Self { temp, output, summary } = self;
        temp.persist(&output)
            .map_err(|e| MrkCoordError::output(&output, e.error))?;

        info!(
            path = %output.display(),
            written = summary.written,
            dropped = summary.dropped,
            "Load-ready file written"
        );
        Ok(summary)
    }
}

/// Write the header and every line whose identifier is not rejected to a
/// temporary file in the output's directory
pub fn prepare_load_ready(
    input: &Path,
    output: &Path,
    rejected: &RejectionSet,
) -> Result<PendingLoadReady> {
    let reader = BufReader::new(File::open(input).map_err(|e| MrkCoordError::input(input, e))?);

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".mrkcoord-load-ready")
        .tempfile_in(dir)
        .map_err(|e| MrkCoordError::output(output, e))?;

    let summary = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let summary = copy_surviving(reader, &mut writer, rejected)
            .map_err(|e| MrkCoordError::output(output, e))?;
        writer.flush().map_err(|e| MrkCoordError::output(output, e))?;
        summary
    };

    debug!(
        path = %temp.path().display(),
        written = summary.written,
        "Load-ready file staged"
    );
    Ok(PendingLoadReady {
        temp,
        output: output.to_path_buf(),
        summary,
    })
}

fn copy_surviving<R: BufRead, W: Write>(
    mut reader: R,
    writer: &mut W,
    rejected: &RejectionSet,
) -> std::io::Result<EmitSummary> {
    let mut summary = EmitSummary::default();
    let mut line = Vec::new();

    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(summary);
    }
    // header: surrounding whitespace dropped, newline restored
    writer.write_all(decode_line(&line).trim().as_bytes())?;
    writer.write_all(b"\n")?;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if rejected.contains(line_identifier(&decode_line(&line))) {
            summary.dropped += 1;
            continue;
        }
        writer.write_all(&line)?;
        summary.written += 1;
    }

    Ok(summary)
}
