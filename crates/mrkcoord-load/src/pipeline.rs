//! QC run orchestration
//!
//! Order of a run:
//! 1. open every report file (the manifest is truncated)
//! 2. parse the feed, reject malformed coordinates, stage the rest
//! 3. bulk load the staging file (fatal on failure)
//! 4. prefetch reference data and run the checks
//! 5. write the reports and the manifest
//! 6. live runs only: stage the load-ready feed, delete stale associations,
//!    then move the feed into place

use std::path::PathBuf;

use mrkcoord_common::Result;
use tracing::{info, warn};

use crate::checks::{self, association, chromosome, marker, provenance};
use crate::config::QcConfig;
use crate::context::{RunContext, RunOutcome};
use crate::emitter::prepare_load_ready;
use crate::parser::CoordinateFeed;
use crate::record::CoordinateRecord;
use crate::reference::{AssociationDeletion, ReferenceIndex, ReferenceStore};
use crate::report::ReportWriter;
use crate::staging::{BulkLoader, StagingWriter};

/// Timestamp format printed under report titles
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// What a QC run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcSummary {
    pub outcome: RunOutcome,
    pub build: String,
    pub records: usize,
    pub staged: usize,
    pub rejected: usize,
    pub discrepancies: usize,
    /// Report files that contained discrepancies
    pub manifest: Vec<PathBuf>,
    /// Associations removed by a live run
    pub associations_deleted: u64,
    /// Lines written to the load-ready file by a live run
    pub load_ready_lines: Option<usize>,
}

/// One QC run over one input feed
pub struct QcPipeline<'a> {
    config: &'a QcConfig,
    store: &'a dyn ReferenceStore,
    loader: &'a dyn BulkLoader,
}

impl<'a> QcPipeline<'a> {
    pub fn new(config: &'a QcConfig, store: &'a dyn ReferenceStore, loader: &'a dyn BulkLoader) -> Self {
        Self {
            config,
            store,
            loader,
        }
    }

    pub async fn run(&self) -> Result<QcSummary> {
        let config = self.config;
        info!(
            input = %config.input.display(),
            live = config.live,
            loader = self.loader.name(),
            "Starting coordinate QC"
        );

        let mut reports = ReportWriter::open(&config.reports)?;
        let mut context = RunContext::new(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string());

        let feed = CoordinateFeed::read(&config.input)?;
        let build = feed.header.build.clone();
        info!(
            build = %build,
            provider = feed.header.get("provider").unwrap_or("unknown"),
            records = feed.records.len(),
            "Feed parsed"
        );

        let (coordinates, staged) = checks::coordinate_strand(&feed.records);
        context.absorb(coordinates);

        let staged_rows = self.stage(&staged, &build)?;
        self.loader
            .load(&config.staging_file, &config.temp_table)
            .await?;

        let index = ReferenceIndex::load(self.store, &feed.records).await?;

        context.absorb(marker::invalid_markers(&staged, &index));
        context.absorb(marker::secondary_markers(&staged, &index));
        let (invalid_chromosomes, excluded) = chromosome::invalid_chromosomes(&staged, &index);
        context.absorb(invalid_chromosomes);
        context.absorb(chromosome::chromosome_discrepancies(&staged, &index, &excluded));
        context.absorb(marker::non_mirna_markers(&staged, &index));

        let diffs = association::diff_associations(&staged, &index);
        context.absorb(association::deletion_report(&diffs));
        context.absorb(association::duplicate_ids(&feed.records));
        context.absorb(association::cross_owned_ids(&feed.records, &index));

        context.absorb(provenance::source_display_novelty(&feed.records, &index));
        context.absorb(provenance::build_novelty(&build, &index));

        let mut manifest = Vec::new();
        for report in context.reports() {
            if let Some(path) = reports.write(report, context.timestamp())? {
                manifest.push(path);
            }
        }
        reports.finish(&manifest)?;

        let mut associations_deleted = 0;
        let mut load_ready_lines = None;
        if config.live {
            // staged first; a failed deletion drops it, a failed write skips the deletions
            let pending =
                prepare_load_ready(&config.input, &config.load_ready_file, context.rejections())?;

            let deletions: Vec<AssociationDeletion> = diffs
                .iter()
                .filter(|diff| !context.is_rejected(&diff.mgi_id))
                .flat_map(|diff| diff.deletions().iter().cloned())
                .collect();
            associations_deleted = self.store.delete_associations(&deletions).await?;

            load_ready_lines = Some(pending.commit()?.written);
        }

        let summary = QcSummary {
            outcome: context.outcome(),
            build,
            records: feed.records.len(),
            staged: staged_rows,
            rejected: context.rejections().len(),
            discrepancies: context.discrepancy_count(),
            manifest,
            associations_deleted,
            load_ready_lines,
        };

        if summary.outcome == RunOutcome::Discrepancies {
            warn!(
                discrepancies = summary.discrepancies,
                reports = summary.manifest.len(),
                "Coordinate QC found discrepancies"
            );
        }
        info!(
            records = summary.records,
            staged = summary.staged,
            rejected = summary.rejected,
            "Coordinate QC complete"
        );
        Ok(summary)
    }

    fn stage(&self, staged: &[&CoordinateRecord], build: &str) -> Result<usize> {
        let mut writer = StagingWriter::create(&self.config.staging_file, build)?;
        for record in staged {
            writer.write(record)?;
        }
        writer.finish()
    }
}
