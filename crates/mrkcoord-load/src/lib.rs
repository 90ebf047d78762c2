//! Marker Coordinate Load
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Quality control and partitioning of marker coordinate feeds before they
//! are published to the MGD datastore.
//!
//! # Overview
//!
//! - **QC**: parse the feed, stage it, validate it against reference data,
//!   reconcile miRBase associations, write reports and the load-ready feed
//! - **Split**: partition a load-ready feed into per-collection files
//! - **Delete**: remove the coordinate features named by a delete file
//! - **Check columns**: column-count sanity check of a feed
//!
//! # Example
//!
//! ```no_run
//! use mrkcoord_load::config::QcConfig;
//! use mrkcoord_load::pipeline::QcPipeline;
//! use mrkcoord_load::reference::MemoryReferenceStore;
//! use mrkcoord_load::staging::CommandLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = QcConfig::from_env("coords.txt".into(), Some(false))?;
//!     let store = MemoryReferenceStore::new();
//!     let loader = CommandLoader::new("/usr/local/bin/bcpin.csh", "localhost", "mgd");
//!     let summary = QcPipeline::new(&config, &store, &loader).run().await?;
//!     std::process::exit(summary.outcome.exit_code().into());
//! }
//! ```

pub mod checks;
pub mod columns;
pub mod config;
pub mod context;
pub mod db;
pub mod delete;
pub mod emitter;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod reference;
pub mod report;
pub mod split;
pub mod staging;
