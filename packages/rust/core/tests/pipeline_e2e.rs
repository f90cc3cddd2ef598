//! End-to-end tests for the relay pipeline: input file → extraction →
//! enrichment → report → archive, plus polling-loop behavior.
//!
//! Each test works in its own temp root with its own store database, so
//! tests run in parallel without interference.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use aoirelay_core::archive::archive_input;
use aoirelay_core::pipeline::{PipelineObserver, SilentObserver, process_file};
use aoirelay_core::poller::run_poller;
use aoirelay_shared::{RecordEvent, RelayError, RunContext, Side, TestStatus};

// ============================================================================
// Test helpers
// ============================================================================

fn temp_root() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("aoirelay-e2e-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn make_ctx(root: &Path) -> RunContext {
    RunContext {
        input_dir: root.join("input"),
        output_dir: root.join("output"),
        backup_dir: root.join("backup"),
        top_operation_id: "OP1".into(),
        bottom_operation_id: "OP2".into(),
        operation_duration: "30".into(),
        database: root.join("mes.db").to_string_lossy().into_owned(),
        machine_name: "TEST".into(),
        poll_interval: Duration::from_millis(50),
        file_timeout: Duration::from_secs(10),
    }
}

/// Create the three MES tables the enrichment lookup joins.
async fn create_store_schema(database: &str) {
    let db = libsql::Builder::new_local(database).build().await.unwrap();
    let conn = db.connect().unwrap();
    conn.execute_batch(
        "CREATE TABLE unit_items (serial_number TEXT, order_id INTEGER);
         CREATE TABLE work_orders (id INTEGER, order_number TEXT);
         CREATE TABLE panel_block_trace (pcb_id TEXT, block_id TEXT, block_no TEXT);",
    )
    .await
    .unwrap();
}

/// Seed one fully-joined enrichment row for a serial.
async fn seed_serial(database: &str, serial: &str, order: &str, block: &str) {
    let db = libsql::Builder::new_local(database).build().await.unwrap();
    let conn = db.connect().unwrap();
    conn.execute_batch(&format!(
        "INSERT INTO unit_items VALUES ('{serial}', 1);
         INSERT INTO work_orders VALUES (1, '{order}');
         INSERT INTO panel_block_trace VALUES ('{serial}', 'BLK', '{block}');"
    ))
    .await
    .unwrap();
}

fn report_files(ctx: &RunContext) -> Vec<PathBuf> {
    match std::fs::read_dir(&ctx.output_dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "xml"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Poll a condition until it holds or the deadline passes.
async fn wait_until(mut cond: impl FnMut() -> bool, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {limit:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Observer collecting everything the pipeline publishes.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<RecordEvent>>,
    failures: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
    cycles: Mutex<Vec<usize>>,
}

impl PipelineObserver for RecordingObserver {
    fn cycle_started(&self, candidates: usize) {
        self.cycles.lock().unwrap().push(candidates);
    }

    fn record_processed(&self, event: &RecordEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn file_failed(&self, file_name: &str, error: &RelayError) {
        self.failures
            .lock()
            .unwrap()
            .push(format!("{file_name}: {error}"));
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

fn spawn_poller(
    ctx: Arc<RunContext>,
    observer: Arc<RecordingObserver>,
) -> (
    watch::Sender<Arc<RunContext>>,
    watch::Sender<bool>,
    tokio::task::JoinHandle<()>,
) {
    let (ctx_tx, ctx_rx) = watch::channel(ctx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let observer: Arc<dyn PipelineObserver> = observer;
    let handle = tokio::spawn(run_poller(ctx_rx, shutdown_rx, observer));
    (ctx_tx, shutdown_tx, handle)
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn top_side_pass_produces_enriched_report_and_archives() {
    let root = temp_root();
    let ctx = Arc::new(make_ctx(&root));
    ctx.ensure_directories().unwrap();
    create_store_schema(&ctx.database).await;
    seed_serial(&ctx.database, "SN123", "WO-77", "4").await;

    std::fs::write(
        ctx.input_dir.join("board.csv"),
        "Barcode,SN123\nResult,Good\nProgram Name,TOP_TEST\n",
    )
    .unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let (_ctx_tx, shutdown_tx, handle) = spawn_poller(ctx.clone(), observer.clone());

    wait_until(|| !report_files(&ctx).is_empty(), Duration::from_secs(10)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    // One report with the frozen attributes, enriched from the store.
    let reports = report_files(&ctx);
    assert_eq!(reports.len(), 1);
    let name = reports[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with("_SN123_GenericTester.xml"), "name: {name}");

    let content = std::fs::read_to_string(&reports[0]).unwrap();
    assert!(content.contains("RecipeId=\"TOP_TEST\""));
    assert!(content.contains("StatusCode=\"PASS\""));
    assert!(content.contains("OperationId=\"OP1\""));
    assert!(content.contains("OperationDuration=\"30\""));
    assert!(content.contains("BarcodeId=\"SN123\""));
    assert!(content.contains("WorkOrderId=\"WO-77\""));
    assert!(content.contains("Sequence=\"4\""));

    // Input moved to backup.
    assert!(!ctx.input_dir.join("board.csv").exists());
    assert!(ctx.backup_dir.join("board.csv").exists());

    // The record event was published to the subscriber.
    let events = observer.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].serial_number, "SN123");
    assert_eq!(events[0].status, TestStatus::Pass);
    assert_eq!(events[0].side, Side::Top);
    assert_eq!(events[0].work_order.as_deref(), Some("WO-77"));

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_side_skips_report_surfaces_notice_and_archives() {
    let root = temp_root();
    let ctx = Arc::new(make_ctx(&root));
    ctx.ensure_directories().unwrap();
    create_store_schema(&ctx.database).await;

    std::fs::write(
        ctx.input_dir.join("board.csv"),
        "Barcode,SN123\nResult,Good\nProgram Name,SIDE_TEST\n",
    )
    .unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let (_ctx_tx, shutdown_tx, handle) = spawn_poller(ctx.clone(), observer.clone());

    wait_until(
        || ctx.backup_dir.join("board.csv").exists(),
        Duration::from_secs(10),
    )
    .await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    // No report, but the file is out of the input directory.
    assert!(report_files(&ctx).is_empty());
    assert!(!ctx.input_dir.join("board.csv").exists());

    let notices = observer.notices.lock().unwrap();
    assert!(
        notices.iter().any(|n| n.contains("Unknown side")),
        "notices: {notices:?}"
    );
    assert!(observer.events.lock().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn missing_result_row_fails_extraction_but_still_archives() {
    let root = temp_root();
    let ctx = make_ctx(&root);
    ctx.ensure_directories().unwrap();
    create_store_schema(&ctx.database).await;

    let input = ctx.input_dir.join("board.csv");
    std::fs::write(&input, "Barcode,SN123\nProgram Name,TOP_TEST\n").unwrap();

    let err = process_file(&ctx, &input, &SilentObserver)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Extraction { .. }));
    assert!(report_files(&ctx).is_empty());

    // The loop archives regardless of the outcome; do the same here.
    archive_input(&ctx.backup_dir, &input).unwrap();
    assert!(!input.exists());
    assert!(ctx.backup_dir.join("board.csv").exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn bottom_side_routes_to_bottom_operation_id() {
    let root = temp_root();
    let ctx = make_ctx(&root);
    ctx.ensure_directories().unwrap();
    create_store_schema(&ctx.database).await;

    let input = ctx.input_dir.join("board.csv");
    std::fs::write(&input, "Barcode,SN9\nResult,NG\nProgram Name,PANEL_BOT\n").unwrap();

    let processed = process_file(&ctx, &input, &SilentObserver).await.unwrap();

    let content = std::fs::read_to_string(&processed.report_path).unwrap();
    assert!(content.contains("OperationId=\"OP2\""));
    assert!(content.contains("StatusCode=\"FAIL\""));
    // No enrichment row seeded: empty but present attributes.
    assert!(content.contains("WorkOrderId=\"\""));
    assert!(content.contains("Sequence=\"\""));

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn lookup_failure_still_emits_report() {
    let root = temp_root();
    let ctx = make_ctx(&root);
    ctx.ensure_directories().unwrap();
    // No schema created: the query fails, the report still goes out.

    let input = ctx.input_dir.join("board.csv");
    std::fs::write(&input, "Barcode,SN1\nResult,Good\nProgram Name,TOP_A\n").unwrap();

    let processed = process_file(&ctx, &input, &SilentObserver).await.unwrap();

    let content = std::fs::read_to_string(&processed.report_path).unwrap();
    assert!(content.contains("BarcodeId=\"SN1\""));
    assert!(content.contains("WorkOrderId=\"\""));

    let _ = std::fs::remove_dir_all(&root);
}

// ============================================================================
// Loop behavior
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn empty_directory_cycles_produce_no_side_effects() {
    let root = temp_root();
    let ctx = Arc::new(make_ctx(&root));
    ctx.ensure_directories().unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let (_ctx_tx, shutdown_tx, handle) = spawn_poller(ctx.clone(), observer.clone());

    wait_until(
        || observer.cycles.lock().unwrap().len() >= 2,
        Duration::from_secs(10),
    )
    .await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(report_files(&ctx).is_empty());
    assert!(observer.events.lock().unwrap().is_empty());
    assert!(observer.failures.lock().unwrap().is_empty());
    assert!(observer.cycles.lock().unwrap().iter().all(|&c| c == 0));

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_interrupts_the_inter_cycle_wait() {
    let root = temp_root();
    let mut ctx = make_ctx(&root);
    // A long interval: shutdown must not wait it out.
    ctx.poll_interval = Duration::from_secs(60);
    let ctx = Arc::new(ctx);
    ctx.ensure_directories().unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let (_ctx_tx, shutdown_tx, handle) = spawn_poller(ctx.clone(), observer.clone());

    wait_until(
        || !observer.cycles.lock().unwrap().is_empty(),
        Duration::from_secs(10),
    )
    .await;

    let started = tokio::time::Instant::now();
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "shutdown took {:?}",
        started.elapsed()
    );

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test(flavor = "multi_thread")]
async fn reloaded_context_is_picked_up_between_cycles() {
    let root = temp_root();
    let ctx_a = Arc::new(make_ctx(&root));
    ctx_a.ensure_directories().unwrap();
    create_store_schema(&ctx_a.database).await;

    // Second context: same store and output, different input directory.
    let mut ctx_b = make_ctx(&root);
    ctx_b.input_dir = root.join("input-b");
    let ctx_b = Arc::new(ctx_b);
    ctx_b.ensure_directories().unwrap();

    std::fs::write(
        ctx_b.input_dir.join("board.csv"),
        "Barcode,SN55\nResult,Good\nProgram Name,TOP_B\n",
    )
    .unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let (ctx_tx, shutdown_tx, handle) = spawn_poller(ctx_a.clone(), observer.clone());

    // Let the poller run on ctx_a, then publish ctx_b.
    wait_until(
        || !observer.cycles.lock().unwrap().is_empty(),
        Duration::from_secs(10),
    )
    .await;
    ctx_tx.send(ctx_b.clone()).unwrap();

    wait_until(|| !report_files(&ctx_b).is_empty(), Duration::from_secs(10)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    let events = observer.events.lock().unwrap();
    assert!(events.iter().any(|e| e.serial_number == "SN55"));

    let _ = std::fs::remove_dir_all(&root);
}
