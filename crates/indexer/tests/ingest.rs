use lens_frontend::FrontendConfig;
use lens_indexer::{Corpus, IngestOutcome, Pipeline, ProjectIngestor, Role, UnitStore};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

const PAYROLL: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. PAYROLL.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
           COPY CUSTREC.
       PROCEDURE DIVISION.
       MAIN-PARA.
           PERFORM UPDATE-BALANCE.
           CALL 'BILLING'.
           STOP RUN.
       UPDATE-BALANCE.
           ADD 100 TO BALANCE.
";

const CUSTREC: &str = "\
\x20      01  CUSTOMER-REC.
           05  BALANCE        PIC 9(7)V99.
";

const BILLING: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. BILLING.
       PROCEDURE DIVISION.
       BILL-PARA.
           GOBACK.
";

fn project() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    let copy = temp.path().join("copy");
    std::fs::create_dir_all(&copy).expect("copy dir");
    std::fs::write(temp.path().join("PAYROLL.cbl"), PAYROLL).expect("payroll");
    std::fs::write(temp.path().join("BILLING.cbl"), BILLING).expect("billing");
    std::fs::write(copy.join("CUSTREC.cpy"), CUSTREC).expect("custrec");
    temp
}

fn pipeline(root: &Path) -> Arc<Pipeline> {
    let config = FrontendConfig::standard().with_copy_path(root.join("copy"));
    Arc::new(Pipeline::new(config, Arc::new(Corpus::new())).expect("pipeline"))
}

#[tokio::test]
async fn project_ingestion_indexes_every_unit() {
    let temp = project();
    let pipeline = pipeline(temp.path());
    let stats = ProjectIngestor::new(temp.path(), Arc::clone(&pipeline))
        .expect("ingestor")
        .with_concurrency(2)
        .ingest_all()
        .await
        .expect("ingest");

    assert_eq!(stats.units, 2);
    assert_eq!(stats.indexed, 2);
    assert!(stats.failed.is_empty());

    let snapshot = pipeline.corpus().snapshot();
    let payroll = snapshot.unit("PAYROLL").expect("payroll unit");
    assert_eq!(payroll.model.program_id.as_deref(), Some("PAYROLL"));
    assert_eq!(payroll.model.items.len(), 2);
    assert_eq!(payroll.model.copybooks, vec!["CUSTREC".to_string()]);
    assert_eq!(payroll.model.external_calls, vec!["BILLING".to_string()]);
    assert!(snapshot.unit_for_program("billing").is_some());

    let balance: Vec<Role> = snapshot
        .occurrences("BALANCE", None)
        .map(|(_, occ)| occ.role)
        .collect();
    assert_eq!(balance, vec![Role::Definition, Role::ReadWrite]);
}

#[tokio::test]
async fn second_run_skips_unchanged_units_and_drops_deleted_ones() {
    let temp = project();
    let pipeline = pipeline(temp.path());
    let ingestor = ProjectIngestor::new(temp.path(), Arc::clone(&pipeline)).expect("ingestor");
    ingestor.ingest_all().await.expect("first run");

    std::fs::remove_file(temp.path().join("BILLING.cbl")).expect("delete billing");
    let stats = ingestor.ingest_all().await.expect("second run");
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.indexed, 0);
    assert_eq!(stats.removed, 1);
    assert!(pipeline.corpus().snapshot().unit("BILLING").is_none());
}

#[tokio::test]
async fn cancelled_batch_starts_no_units() {
    let temp = project();
    let pipeline = pipeline(temp.path());
    let ingestor = ProjectIngestor::new(temp.path(), Arc::clone(&pipeline)).expect("ingestor");
    ingestor.cancel_handle().store(true, Ordering::Relaxed);

    let stats = ingestor.ingest_all().await.expect("ingest");
    assert!(stats.cancelled);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.removed, 0);
    assert!(pipeline.corpus().snapshot().is_empty());
}

#[test]
fn reingesting_identical_text_is_byte_identical() {
    let temp = project();
    let first = pipeline(temp.path());
    let second = pipeline(temp.path());
    first.ingest_file(&temp.path().join("PAYROLL.cbl")).expect("first");
    second.ingest_file(&temp.path().join("PAYROLL.cbl")).expect("second");

    let a = first.corpus().snapshot();
    let b = second.corpus().snapshot();
    let (a, b) = (a.unit("PAYROLL").expect("a"), b.unit("PAYROLL").expect("b"));
    assert_eq!(
        serde_json::to_string(a.model.as_ref()).expect("json"),
        serde_json::to_string(b.model.as_ref()).expect("json")
    );
    assert_eq!(
        serde_json::to_string(a.index.as_ref()).expect("json"),
        serde_json::to_string(b.index.as_ref()).expect("json")
    );
}

#[test]
fn changed_text_replaces_the_whole_unit() {
    let temp = project();
    let pipeline = pipeline(temp.path());
    pipeline.ingest_text("PAYROLL", None, PAYROLL).expect("first");
    let renamed = PAYROLL.replace("UPDATE-BALANCE", "POST-BALANCE");
    let outcome = pipeline.ingest_text("PAYROLL", None, &renamed).expect("second");
    assert!(matches!(outcome, IngestOutcome::Indexed { .. }));

    let snapshot = pipeline.corpus().snapshot();
    assert_eq!(snapshot.occurrences("UPDATE-BALANCE", None).count(), 0);
    assert_eq!(snapshot.occurrences("POST-BALANCE", None).count(), 2);
}

#[tokio::test]
async fn store_round_trips_units_and_prunes_removed_ones() {
    let temp = project();
    let pipeline = pipeline(temp.path());
    ProjectIngestor::new(temp.path(), Arc::clone(&pipeline))
        .expect("ingestor")
        .ingest_all()
        .await
        .expect("ingest");

    let store = UnitStore::for_project_root(temp.path());
    let written = store.sync(&pipeline.corpus().snapshot()).await.expect("sync");
    assert_eq!(written, 2);
    assert_eq!(store.sync(&pipeline.corpus().snapshot()).await.expect("resync"), 0);

    let restored = Corpus::new();
    assert_eq!(store.restore_into(&restored).await.expect("restore"), 2);
    let snapshot = restored.snapshot();
    let original = pipeline.corpus().snapshot();
    assert_eq!(
        snapshot.unit("PAYROLL").expect("restored").model.as_ref(),
        original.unit("PAYROLL").expect("original").model.as_ref()
    );

    pipeline.corpus().remove("BILLING");
    store.sync(&pipeline.corpus().snapshot()).await.expect("prune");
    assert_eq!(store.load_all().await.expect("load").len(), 1);
}
