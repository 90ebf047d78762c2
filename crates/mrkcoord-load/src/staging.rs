//! Staging file and bulk-load handoff
//!
//! Syntactically valid records are written to a tab-delimited staging file
//! which a [`BulkLoader`] then moves into the staging table in one batch.
//! Loader failures are fatal for the run and never retried.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mrkcoord_common::{MrkCoordError, Result};
use sqlx::postgres::PgPoolCopyExt;
use sqlx::PgPool;
use tokio::process::Command;
use tracing::{debug, info};

use crate::record::CoordinateRecord;

/// Unquoted, tab-delimited, `\n`-terminated writer used for every
/// delimited file the load produces
pub(crate) fn tab_writer<W: std::io::Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .has_headers(false)
        .flexible(true)
        .from_writer(writer)
}

/// Writes staged records in the column order of the staging table:
/// identifier, chromosome, start, end, strand, source, display, external
/// IDs, build
pub struct StagingWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    build: String,
    rows: usize,
}

impl StagingWriter {
    /// Create (truncate) the staging file
    pub fn create(path: &Path, build: &str) -> Result<Self> {
        let file = File::create(path).map_err(|e| MrkCoordError::output(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: tab_writer(file),
            build: build.to_string(),
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &CoordinateRecord) -> Result<()> {
        self.writer
            .write_record([
                record.mgi_id.as_str(),
                record.chromosome.as_str(),
                record.start.as_str(),
                record.end.as_str(),
                record.strand.as_str(),
                record.source.as_str(),
                record.display.as_str(),
                record.external_ids_raw.as_str(),
                self.build.as_str(),
            ])
            .map_err(|e| self.csv_error(e))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush the file and return the number of staged rows
    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .map_err(|e| MrkCoordError::output(&self.path, e))?;
        debug!(path = %self.path.display(), rows = self.rows, "Staging file written");
        Ok(self.rows)
    }

    fn csv_error(&self, err: csv::Error) -> MrkCoordError {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => MrkCoordError::output(&self.path, e),
            other => MrkCoordError::Parse(format!("staging row rejected: {other:?}")),
        }
    }
}

/// Moves a staging file into a table
#[async_trait]
pub trait BulkLoader: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Load every row of `file`, in order, into `table`
    async fn load(&self, file: &Path, table: &str) -> Result<()>;
}

/// Runs an external bcp-style script
///
/// Invoked as `<program> <server> <database> <table> / <file> \t \n mgd`.
pub struct CommandLoader {
    program: PathBuf,
    server: String,
    database: String,
}

impl CommandLoader {
    pub fn new(program: impl Into<PathBuf>, server: &str, database: &str) -> Self {
        Self {
            program: program.into(),
            server: server.to_string(),
            database: database.to_string(),
        }
    }

    fn args(&self, file: &Path, table: &str) -> Vec<std::ffi::OsString> {
        vec![
            self.server.as_str().into(),
            self.database.as_str().into(),
            table.into(),
            "/".into(),
            file.as_os_str().to_owned(),
            "\\t".into(),
            "\\n".into(),
            "mgd".into(),
        ]
    }
}

#[async_trait]
impl BulkLoader for CommandLoader {
    fn name(&self) -> &str {
        "command"
    }

    async fn load(&self, file: &Path, table: &str) -> Result<()> {
        info!(
            command = %self.program.display(),
            table,
            file = %file.display(),
            "Running bulk load command"
        );

        let output = Command::new(&self.program)
            .args(self.args(file, table))
            .output()
            .await
            .map_err(|e| MrkCoordError::BulkLoad {
                table: table.to_string(),
                message: format!("cannot run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MrkCoordError::BulkLoad {
                table: table.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "Bulk load command finished");
        Ok(())
    }
}

/// Loads through PostgreSQL `COPY ... FROM STDIN`
///
/// The table is emptied first; empty fields load as NULL.
pub struct CopyLoader {
    pool: PgPool,
}

impl CopyLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BulkLoader for CopyLoader {
    fn name(&self) -> &str {
        "copy"
    }

    async fn load(&self, file: &Path, table: &str) -> Result<()> {
        let bulk_error = |message: String| MrkCoordError::BulkLoad {
            table: table.to_string(),
            message,
        };

        let data = tokio::fs::read(file)
            .await
            .map_err(|e| MrkCoordError::input(file, e))?;

        sqlx::query(&format!("TRUNCATE TABLE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| bulk_error(e.to_string()))?;

        let mut copy = self
            .pool
            .copy_in_raw(&format!("COPY {table} FROM STDIN WITH (FORMAT text, NULL '')"))
            .await
            .map_err(|e| bulk_error(e.to_string()))?;

        if let Err(e) = copy.send(data).await {
            // the copy is still open; abort it so the connection is reusable
            let _ = copy.abort(e.to_string()).await;
            return Err(bulk_error(e.to_string()));
        }
        let rows = copy.finish().await.map_err(|e| bulk_error(e.to_string()))?;

        info!(table, rows, "Staging table loaded");
        Ok(())
    }
}
