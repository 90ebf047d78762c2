//! Shared fixtures for the marker coordinate load integration tests
//!
//! - [`QcFixture`]: a temporary directory holding an input feed and every
//!   report, with a [`QcConfig`] pointing into it
//! - [`RecordingLoader`]: a [`BulkLoader`] that keeps what it was handed
//! - [`TestPostgres`]: a PostgreSQL container with a minimal MGD schema

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mrkcoord_common::MrkCoordError;
use mrkcoord_load::config::QcConfig;
use mrkcoord_load::staging::BulkLoader;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::Mutex;
use tracing::info;

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,mrkcoord_load=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

// ============================================================================
// QC fixture
// ============================================================================

pub struct QcFixture {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
}

impl QcFixture {
    /// Write `feed` as the input of a fresh fixture
    pub fn new(feed: &str) -> Result<Self> {
        Self::from_bytes(feed.as_bytes())
    }

    pub fn from_bytes(feed: &[u8]) -> Result<Self> {
        let dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let input = dir.path().join("coords.txt");
        std::fs::write(&input, feed).context("Failed to write input feed")?;
        Ok(Self { dir, input })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Configuration with every file inside the fixture directory
    pub fn config(&self, live: bool) -> Result<QcConfig> {
        let dir = self.dir.path().to_string_lossy().into_owned();
        QcConfig::from_lookup(self.input.clone(), Some(live), |key| match key {
            "RPTDIR" => Some(dir.clone()),
            _ => None,
        })
        .context("Failed to build QC configuration")
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).unwrap_or_default()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// File names listed in the manifest
    pub fn manifest(&self) -> Vec<String> {
        self.read("rpt_names.rpt")
            .lines()
            .filter_map(|line| Path::new(line).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

// ============================================================================
// Recording loader
// ============================================================================

/// One call made to a [`RecordingLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCall {
    pub table: String,
    pub contents: String,
}

#[derive(Default)]
pub struct RecordingLoader {
    calls: Mutex<Vec<LoadCall>>,
    fail: bool,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader whose every load fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<LoadCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl BulkLoader for RecordingLoader {
    fn name(&self) -> &str {
        "recording"
    }

    async fn load(&self, file: &Path, table: &str) -> mrkcoord_common::Result<()> {
        if self.fail {
            return Err(MrkCoordError::BulkLoad {
                table: table.to_string(),
                message: "loader exited with status 1".to_string(),
            });
        }
        let contents =
            tokio::fs::read_to_string(file).await.map_err(|e| MrkCoordError::input(file, e))?;
        self.calls.lock().await.push(LoadCall {
            table: table.to_string(),
            contents,
        });
        Ok(())
    }
}

// ============================================================================
// PostgreSQL container
// ============================================================================

/// Tables and columns of the MGD schema the load reads and writes
const MGD_SCHEMA: &[&str] = &[
    "CREATE TABLE acc_mgitype (_mgitype_key INT PRIMARY KEY, name TEXT NOT NULL)",
    r#"CREATE TABLE acc_accession (
        _accession_key INT PRIMARY KEY,
        accid TEXT NOT NULL,
        prefixpart TEXT,
        _logicaldb_key INT NOT NULL,
        _object_key INT NOT NULL,
        _mgitype_key INT NOT NULL,
        preferred SMALLINT NOT NULL DEFAULT 1
    )"#,
    "CREATE TABLE acc_accessionreference (_accession_key INT NOT NULL, _refs_key INT NOT NULL)",
    "CREATE TABLE mrk_status (_marker_status_key INT PRIMARY KEY, status TEXT NOT NULL)",
    r#"CREATE TABLE mrk_marker (
        _marker_key INT PRIMARY KEY,
        _organism_key INT NOT NULL,
        _marker_status_key INT NOT NULL,
        symbol TEXT NOT NULL,
        chromosome TEXT NOT NULL
    )"#,
    "CREATE TABLE mrk_chromosome (_organism_key INT NOT NULL, chromosome TEXT NOT NULL)",
    "CREATE TABLE mrk_mcv_cache (_marker_key INT NOT NULL, term TEXT NOT NULL, qualifier TEXT NOT NULL)",
    "CREATE TABLE mrk_location_cache (_marker_key INT NOT NULL)",
    r#"CREATE TABLE map_coord_collection (
        _collection_key INT PRIMARY KEY,
        name TEXT NOT NULL,
        abbreviation TEXT NOT NULL
    )"#,
    "CREATE TABLE map_coordinate (_map_key INT PRIMARY KEY, _collection_key INT NOT NULL, version TEXT)",
    r#"CREATE TABLE map_coord_feature (
        _feature_key INT PRIMARY KEY,
        _map_key INT NOT NULL,
        _object_key INT NOT NULL,
        _mgitype_key INT NOT NULL
    )"#,
    r#"CREATE TABLE mrkcoord_qc_tmp (
        mgiid TEXT,
        chromosome TEXT,
        startcoordinate TEXT,
        endcoordinate TEXT,
        strand TEXT,
        provider TEXT,
        display TEXT,
        mirbaseids TEXT,
        build TEXT
    )"#,
];

pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    url: String,
}

impl TestPostgres {
    /// Start a PostgreSQL container with the MGD tables created
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;
        let url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        for statement in MGD_SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .with_context(|| format!("Failed to create schema: {statement}"))?;
        }

        Ok(Self {
            container,
            pool,
            url,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run fixture statements in order
    pub async fn seed(&self, statements: &[&str]) -> Result<()> {
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to seed: {statement}"))?;
        }
        Ok(())
    }
}
