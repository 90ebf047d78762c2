//! Removal of coordinate features named by a delete file
//!
//! Each `MGI:` line names a marker and a coordinate collection. Every pair
//! must resolve to at least one coordinate feature; unresolved pairs are
//! fatal and block the delete. Preview runs resolve and report but never
//! delete.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mrkcoord_common::{MrkCoordError, Result};
use tracing::{debug, info, warn};

use crate::record::{decoded_lines, FIELD_SEPARATOR};

/// Timestamp format of the diagnostics and error files
pub const DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Prefix of the lines that name a feature
pub const LINE_PREFIX: &str = "MGI:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Resolve and report only
    Preview,
    Live,
}

impl DeleteMode {
    /// `preview` selects a preview run; any other mode deletes
    pub fn from_arg(mode: &str) -> Self {
        if mode == "preview" {
            Self::Preview
        } else {
            Self::Live
        }
    }
}

/// Coordinate feature lookup and removal
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Feature keys of the preferred marker `mgi_id` in the collection
    /// named `collection`
    async fn features(&self, mgi_id: &str, collection: &str) -> Result<Vec<i32>>;

    /// Delete the features in a single transaction
    async fn delete_features(&self, feature_keys: &[i32]) -> Result<u64>;
}

/// One `MGI:` line of a delete file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub line_number: usize,
    pub mgi_id: String,
    pub collection: String,
}

/// Read the delete requests of a file; other lines are skipped
pub fn read_requests<R: BufRead>(reader: R) -> Result<Vec<DeleteRequest>> {
    let mut requests = Vec::new();
    for (index, line) in decoded_lines(reader).enumerate() {
        let line = line?;
        if !line.starts_with(LINE_PREFIX) {
            continue;
        }
        let line_number = index + 1;
        let mut fields = line.trim_end_matches(['\n', '\r']).split(FIELD_SEPARATOR);
        let (Some(mgi_id), Some(collection)) = (fields.next(), fields.next()) else {
            return Err(MrkCoordError::Parse(format!(
                "Invalid Line ({line_number}): {}",
                line.trim_end()
            )));
        };
        requests.push(DeleteRequest {
            line_number,
            mgi_id: mgi_id.to_string(),
            collection: collection.to_string(),
        });
    }
    Ok(requests)
}

/// Files and target of a delete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfig {
    pub input: PathBuf,
    pub mode: DeleteMode,
    pub diagnostics: PathBuf,
    pub errors: PathBuf,
    /// Shown in the diagnostics header
    pub server: String,
    pub database: String,
}

impl DeleteConfig {
    /// Preview runs write `<input>.diagnostics` and `<input>.error`; other
    /// runs need `LOG_DIAG` and `LOG_ERROR`
    pub fn new(
        input: PathBuf,
        mode: DeleteMode,
        log_diag: Option<PathBuf>,
        log_error: Option<PathBuf>,
    ) -> Result<Self> {
        let (diagnostics, errors) = match mode {
            DeleteMode::Preview => (with_suffix(&input, "diagnostics"), with_suffix(&input, "error")),
            DeleteMode::Live => (
                log_diag.ok_or_else(|| MrkCoordError::MissingEnv("LOG_DIAG".to_string()))?,
                log_error.ok_or_else(|| MrkCoordError::MissingEnv("LOG_ERROR".to_string()))?,
            ),
        };
        Ok(Self {
            input,
            mode,
            diagnostics,
            errors,
            server: String::new(),
            database: String::new(),
        })
    }

    pub fn with_target(mut self, server: impl Into<String>, database: impl Into<String>) -> Self {
        self.server = server.into();
        self.database = database.into();
        self
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// What a delete run found and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub requests: usize,
    pub unresolved: Vec<DeleteRequest>,
    pub features_deleted: u64,
}

impl DeleteSummary {
    /// True when the sanity check passed
    pub fn is_ok(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Resolve, check and (outside preview) delete the features of a file
pub async fn delete_features(config: &DeleteConfig, store: &dyn FeatureStore) -> Result<DeleteSummary> {
    let input = File::open(&config.input).map_err(|e| MrkCoordError::input(&config.input, e))?;
    let requests = read_requests(BufReader::new(input))?;
    info!(
        input = %config.input.display(),
        mode = ?config.mode,
        requests = requests.len(),
        "Starting coordinate feature delete"
    );

    let mut diagnostics = LogFile::open(&config.diagnostics, config.mode == DeleteMode::Live)?;
    let mut errors = LogFile::open(&config.errors, false)?;
    diagnostics.line(&format!("Start Date/Time: {}", now()))?;
    diagnostics.line(&format!("Server: {}", config.server))?;
    diagnostics.line(&format!("Database: {}", config.database))?;
    errors.line(&format!("Start Date/Time: {}\n", now()))?;

    let mut summary = DeleteSummary {
        requests: requests.len(),
        ..Default::default()
    };
    let mut feature_keys = Vec::new();
    for request in requests {
        let keys = store.features(&request.mgi_id, &request.collection).await?;
        if keys.is_empty() {
            errors.line(&format!(
                "Invalid Mapping Coordinate (row {}) {} {}",
                request.line_number, request.mgi_id, request.collection
            ))?;
            warn!(
                line = request.line_number,
                mgi_id = %request.mgi_id,
                collection = %request.collection,
                "Coordinate feature not found"
            );
            summary.unresolved.push(request);
            continue;
        }
        debug!(mgi_id = %request.mgi_id, collection = %request.collection, ?keys, "Resolved features");
        feature_keys.extend(keys);
    }

    if config.mode == DeleteMode::Live && summary.is_ok() && !feature_keys.is_empty() {
        summary.features_deleted = store.delete_features(&feature_keys).await?;
        diagnostics.line(&format!("Deleted {} coordinate feature(s)", summary.features_deleted))?;
    }

    diagnostics.line(&format!("\n\nEnd Date/Time: {}", now()))?;
    if summary.is_ok() {
        errors.line("\nSanity check : successful")?;
    } else {
        errors.line("\nSanity check : failed")?;
        errors.line("Errors must be fixed before file is published.")?;
    }
    errors.line(&format!("\n\nEnd Date/Time: {}", now()))?;
    diagnostics.finish()?;
    errors.finish()?;

    info!(
        requests = summary.requests,
        unresolved = summary.unresolved.len(),
        deleted = summary.features_deleted,
        "Coordinate feature delete complete"
    );
    Ok(summary)
}

fn now() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    fn open(path: &Path, append: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| MrkCoordError::output(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "{text}").map_err(|e| MrkCoordError::output(&self.path, e))
    }

    fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| MrkCoordError::output(&self.path, e))
    }
}
