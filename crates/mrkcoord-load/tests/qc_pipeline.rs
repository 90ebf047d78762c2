//! End-to-end QC runs over temporary directories and an in-memory datastore

mod common;

use std::collections::BTreeSet;

use common::{init_test_tracing, QcFixture, RecordingLoader};
use mrkcoord_common::MrkCoordError;
use mrkcoord_load::context::RunOutcome;
use mrkcoord_load::pipeline::QcPipeline;
use mrkcoord_load::reference::MemoryReferenceStore;
use pretty_assertions::assert_eq;

const FEED: &str = concat!(
    "build=GRCm39; provider=MGI \n",
    "MGI:101\t5\t1000\tABC\t+\tNCBI\tNCBI Gene\tMI0000001\n",
    "MGI:202\t3\t500\t400\t-\tEnsembl\tEnsembl Gene\t\n",
    "MGI:303\t1\t100\t200\t+\tmiRBase\tmiRBase\tX1,X3\n",
    "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\n",
    "MGI:999\t1\t10\t20\t+\tNCBI\tNCBI Gene\t\n",
);

fn store() -> MemoryReferenceStore {
    MemoryReferenceStore::new()
        .with_marker("MGI:101", 101, "Gm101", "5", 1)
        .with_marker("MGI:202", 202, "Gm202", "3", 1)
        .with_marker("MGI:303", 303, "Mir303", "1", 1)
        .with_association("MGI:303", "X1")
        .with_association("MGI:303", "X2")
        .with_feature_type(303, "miRNA gene")
        .with_marker("MGI:404", 404, "Kit", "2", 1)
        .with_chromosomes(["1", "2", "3", "5", "X", "Y", "MT", "UN"])
        .with_collection("NCBI", "NCBI Gene")
        .with_collection("Ensembl", "Ensembl Gene")
        .with_collection("miRBase", "miRBase")
        .with_build("GRCm38")
}

#[tokio::test]
async fn test_live_run() {
    init_test_tracing();
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(true).unwrap();
    let store = store();
    let loader = RecordingLoader::new();

    let summary = QcPipeline::new(&config, &store, &loader).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Discrepancies);
    assert_eq!(summary.outcome.exit_code(), 2);
    assert_eq!(summary.build, "GRCm39");
    assert_eq!(summary.records, 5);
    assert_eq!(summary.staged, 3);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.associations_deleted, 1);
    assert_eq!(summary.load_ready_lines, Some(2));

    assert_eq!(
        fixture.manifest(),
        vec![
            "invalid_coord_strand.rpt",
            "invalid_marker.rpt",
            "mirbase_delete.rpt",
            "build.rpt",
        ]
    );

    let coordinates = fixture.read("invalid_coord_strand.rpt");
    assert!(coordinates.contains("Invalid end coordinate"));
    assert!(coordinates.contains("Start coordinate > end coordinate"));
    assert!(coordinates.contains("Number of Rows: 2"));

    let invalid = fixture.read("invalid_marker.rpt");
    assert!(invalid.contains("MGI:999"));
    assert!(invalid.contains("MGI ID does not exist"));

    let deletions = fixture.read("mirbase_delete.rpt");
    let row = deletions
        .lines()
        .find(|line| line.starts_with("MGI:303"))
        .unwrap();
    assert!(row.contains("Mir303"));
    assert!(row.contains("X3"));
    assert!(row.contains("X2"));

    let build = fixture.read("build.rpt");
    assert!(build.contains("GRCm39"));
    assert!(build.contains("Number of Rows: 1"));

    // only the removed association is gone; X3 is left for the association load
    assert_eq!(
        store.associated_ids("MGI:303").await,
        BTreeSet::from(["X1".to_string()])
    );

    assert_eq!(
        std::fs::read_to_string(&config.load_ready_file).unwrap(),
        concat!(
            "build=GRCm39; provider=MGI\n",
            "MGI:303\t1\t100\t200\t+\tmiRBase\tmiRBase\tX1,X3\n",
            "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\n",
        )
    );
}

#[tokio::test]
async fn test_preview_run_changes_nothing() {
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(false).unwrap();
    let store = store();
    let loader = RecordingLoader::new();

    let summary = QcPipeline::new(&config, &store, &loader).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Discrepancies);
    assert_eq!(summary.associations_deleted, 0);
    assert_eq!(summary.load_ready_lines, None);
    assert!(!config.load_ready_file.exists());
    assert_eq!(
        store.associated_ids("MGI:303").await,
        BTreeSet::from(["X1".to_string(), "X2".to_string()])
    );
    assert!(fixture.manifest().contains(&"mirbase_delete.rpt".to_string()));
}

#[tokio::test]
async fn test_staging_file_handed_to_loader() {
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(false).unwrap();
    let loader = RecordingLoader::new();

    QcPipeline::new(&config, &store(), &loader).run().await.unwrap();

    let calls = loader.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].table, "mrkcoord_qc_tmp");
    assert_eq!(
        calls[0].contents,
        concat!(
            "MGI:303\t1\t100\t200\t+\tmiRBase\tmiRBase\tX1,X3\tGRCm39\n",
            "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\tGRCm39\n",
            "MGI:999\t1\t10\t20\t+\tNCBI\tNCBI Gene\t\tGRCm39\n",
        )
    );
}

#[tokio::test]
async fn test_clean_run() {
    let fixture = QcFixture::new(concat!(
        "build=GRCm38\n",
        "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\n",
        "MGI:303\t1\t\t\t\tmiRBase\tmiRBase\tX1, X2\n",
    ))
    .unwrap();
    let config = fixture.config(true).unwrap();
    let loader = RecordingLoader::new();

    let summary = QcPipeline::new(&config, &store(), &loader).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Clean);
    assert_eq!(summary.outcome.exit_code(), 0);
    assert!(summary.manifest.is_empty());
    assert_eq!(fixture.read("rpt_names.rpt"), "");
    assert_eq!(summary.load_ready_lines, Some(2));

    // every report is still written, with a zero count
    assert!(fixture.read("sec_marker.rpt").contains("Number of Rows: 0"));
}

#[tokio::test]
async fn test_reporting_only_checks_do_not_reject() {
    let store = store()
        .with_secondary_id("MGI:405", 404)
        .with_feature_type(404, "protein coding gene")
        .with_marker("MGI:505", 505, "Mir505", "Y", 1)
        .with_association("MGI:505", "MI0000505")
        .with_marker("MGI:606", 606, "Mir606", "1", 1)
        .with_association("MGI:606", "MI0000606");
    let fixture = QcFixture::new(concat!(
        "build=GRCm38\n",
        // secondary ID
        "MGI:405\t3\t100\t200\t+\tNCBI\tNCBI Gene\t\n",
        // duplicate claim on MI0000777, MI0000606 owned by MGI:606, not a miRNA gene
        "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\tMI0000777,MI0000606\n",
        "MGI:303\t1\t100\t200\t+\tmiRBase\tmiRBase\tX1,X2,MI0000777\n",
        // chromosome differs from the marker's, new source/display
        "MGI:505\tX\t100\t200\t+\tVEGA\tVEGA Gene Model\tMI0000505\n",
    ))
    .unwrap();
    let config = fixture.config(true).unwrap();
    let loader = RecordingLoader::new();

    let summary = QcPipeline::new(&config, &store, &loader).run().await.unwrap();

    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.load_ready_lines, Some(4));
    assert_eq!(
        fixture.manifest(),
        vec![
            "sec_marker.rpt",
            "chr_discrep.rpt",
            "non_mirna_marker.rpt",
            "mirbase_dup.rpt",
            "mirbase_other_mkr.rpt",
            "source_display.rpt",
        ]
    );

    let secondary = fixture.read("sec_marker.rpt");
    assert!(secondary.contains("MGI:405"));
    assert!(secondary.contains("MGI:404"));

    let duplicates = fixture.read("mirbase_dup.rpt");
    assert!(duplicates.contains("MGI:303,MGI:404"));
    assert!(duplicates.contains("Number of Rows: 1"));

    let cross_owned = fixture.read("mirbase_other_mkr.rpt");
    let row = cross_owned
        .lines()
        .find(|line| line.starts_with("MI0000606"))
        .unwrap();
    assert!(row.contains("MGI:404"));
    assert!(row.contains("MGI:606"));

    assert!(fixture.read("chr_discrep.rpt").contains("MGI:505"));
    assert!(fixture.read("non_mirna_marker.rpt").contains("protein coding gene"));
}

#[tokio::test]
async fn test_invalid_chromosome_rejected_without_discrepancy() {
    let fixture = QcFixture::new(concat!(
        "build=GRCm38\n",
        "MGI:404\t22\t100\t200\t+\tNCBI\tNCBI Gene\t\n",
        "MGI:303\tUN\t100\t200\t+\tmiRBase\tmiRBase\tX1,X2\n",
    ))
    .unwrap();
    let config = fixture.config(true).unwrap();
    let loader = RecordingLoader::new();

    let summary = QcPipeline::new(&config, &store(), &loader).run().await.unwrap();

    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.load_ready_lines, Some(0));
    assert_eq!(fixture.manifest(), vec!["invalid_chr.rpt"]);
    assert!(fixture
        .read("chr_discrep.rpt")
        .contains("Number of Rows: 0"));
}

#[tokio::test]
async fn test_loader_failure_is_fatal() {
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(true).unwrap();
    let store = store();

    let err = QcPipeline::new(&config, &store, &RecordingLoader::failing())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MrkCoordError::BulkLoad { .. }));
    assert!(!config.load_ready_file.exists());
    assert_eq!(store.associated_ids("MGI:303").await.len(), 2);
}

#[tokio::test]
async fn test_failed_deletion_blocks_load_ready_file() {
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(true).unwrap();
    let store = store().with_failing_deletion("X2");

    let err = QcPipeline::new(&config, &store, &RecordingLoader::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MrkCoordError::Database(_)));
    assert!(!config.load_ready_file.exists());
    // reports were already written
    assert!(fixture.manifest().contains(&"mirbase_delete.rpt".to_string()));
}

#[tokio::test]
async fn test_unwritable_load_ready_file_keeps_associations() {
    let fixture = QcFixture::new(FEED).unwrap();
    let mut config = fixture.config(true).unwrap();
    config.load_ready_file = fixture.path("missing").join("coords.load");
    let store = store();

    let err = QcPipeline::new(&config, &store, &RecordingLoader::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MrkCoordError::OutputFile { .. }));
    assert!(!config.load_ready_file.exists());
    // the stale association is still there for the next run to report
    assert_eq!(
        store.associated_ids("MGI:303").await,
        BTreeSet::from(["X1".to_string(), "X2".to_string()])
    );
}

#[tokio::test]
async fn test_failed_deletion_leaves_no_staged_file() {
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(true).unwrap();
    let store = store().with_failing_deletion("X2");

    QcPipeline::new(&config, &store, &RecordingLoader::new())
        .run()
        .await
        .unwrap_err();

    let leftovers: Vec<String> = std::fs::read_dir(config.load_ready_file.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".mrkcoord-load-ready"))
        .collect();
    assert!(leftovers.is_empty(), "staged files left behind: {leftovers:?}");
}

#[tokio::test]
async fn test_survivors_copied_exactly_among_rejected_lines() {
    let fixture = QcFixture::new(concat!(
        "  build=GRCm38 \t\r\n",
        "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\r\n",
        "MGI:101\t5\t1000\tABC\t+\tNCBI\tNCBI Gene\t\n",
        " MGI:202 \t 3 \t100 \t 200\t-\tEnsembl\tEnsembl Gene\t \n",
        "MGI:999\t1\t10\t20\t+\tNCBI\tNCBI Gene\t\n",
        "MGI:303\t1\t100\t200\t+\tmiRBase\tmiRBase\tX1, X2\n",
        "MGI:101\t5\t1\t2\t+\tNCBI\tNCBI Gene\t\n",
        "MGI:202\t3\t300\t400\t-\tEnsembl\tEnsembl Gene\t",
    ))
    .unwrap();
    let config = fixture.config(true).unwrap();

    let summary = QcPipeline::new(&config, &store(), &RecordingLoader::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.associations_deleted, 0);
    assert_eq!(summary.load_ready_lines, Some(4));
    // MGI:101 is dropped on both lines, including the well-formed one
    assert_eq!(
        std::fs::read(&config.load_ready_file).unwrap(),
        concat!(
            "build=GRCm38\n",
            "MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\r\n",
            " MGI:202 \t 3 \t100 \t 200\t-\tEnsembl\tEnsembl Gene\t \n",
            "MGI:303\t1\t100\t200\t+\tmiRBase\tmiRBase\tX1, X2\n",
            "MGI:202\t3\t300\t400\t-\tEnsembl\tEnsembl Gene\t",
        )
        .as_bytes()
    );
}

#[tokio::test]
async fn test_missing_build_is_fatal() {
    let fixture = QcFixture::new("provider=MGI\nMGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene\t\n").unwrap();
    let config = fixture.config(false).unwrap();

    let err = QcPipeline::new(&config, &store(), &RecordingLoader::new())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, MrkCoordError::Parse(_)));
}

#[tokio::test]
async fn test_latin1_lines_survive_byte_for_byte() {
    let mut feed = b"build=GRCm38\n".to_vec();
    let line = b"MGI:404\t2\t100\t200\t+\tNCBI\tNCBI Gene \xe9\t\n";
    feed.extend_from_slice(line);
    let fixture = QcFixture::from_bytes(&feed).unwrap();
    let config = fixture.config(true).unwrap();

    QcPipeline::new(&config, &store(), &RecordingLoader::new())
        .run()
        .await
        .unwrap();

    let written = std::fs::read(&config.load_ready_file).unwrap();
    assert_eq!(&written[b"build=GRCm38\n".len()..], &line[..]);
}

#[tokio::test]
async fn test_reports_append_across_runs() {
    let fixture = QcFixture::new(FEED).unwrap();
    let config = fixture.config(false).unwrap();

    for _ in 0..2 {
        QcPipeline::new(&config, &store(), &RecordingLoader::new())
            .run()
            .await
            .unwrap();
    }

    let build = fixture.read("build.rpt");
    assert_eq!(build.matches("Number of Rows: 1").count(), 2);
    // the manifest only describes the latest run
    assert_eq!(fixture.manifest().len(), 4);
}
