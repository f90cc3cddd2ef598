//! Per-file processing sequence: extract → route side → enrich → report.
//!
//! The sequence returns a `Result`-typed outcome consumed by the polling
//! loop; every failure path is one of the error taxonomy's kinds. Archival
//! is deliberately not part of this function — the loop moves the file to
//! backup after every attempt, success or failure.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use aoirelay_extract::extract_record;
use aoirelay_shared::{RecordEvent, RelayError, Result, RunContext};
use aoirelay_store::EnrichStore;

/// Outcome of one successfully processed file.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Name of the input file.
    pub file_name: String,
    /// Serial number of the record it carried.
    pub serial_number: String,
    /// Where the report landed.
    pub report_path: PathBuf,
}

/// Observer for pipeline progress and notices.
///
/// Emission is fire-and-forget: the pipeline never waits on a subscriber
/// and never assumes one is attached.
pub trait PipelineObserver: Send + Sync {
    /// Called at the top of each polling cycle with the candidate count.
    fn cycle_started(&self, candidates: usize);
    /// Called when a record has cleared extraction and enrichment.
    fn record_processed(&self, event: &RecordEvent);
    /// Called when a file fails with a per-file error.
    fn file_failed(&self, file_name: &str, error: &RelayError);
    /// Immediately actionable conditions for an interactive surface.
    fn notice(&self, message: &str);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn cycle_started(&self, _candidates: usize) {}
    fn record_processed(&self, _event: &RecordEvent) {}
    fn file_failed(&self, _file_name: &str, _error: &RelayError) {}
    fn notice(&self, _message: &str) {}
}

/// Run one input file through the per-file sequence.
///
/// 1. Open the file and the per-file store connection
/// 2. Extract the record
/// 3. Resolve the side to an operation id
/// 4. Enrich from the store (recoverable on query failure)
/// 5. Publish the record event
/// 6. Write the report
#[instrument(skip_all, fields(file = %path.display()))]
pub async fn process_file(
    ctx: &RunContext,
    path: &Path,
    observer: &dyn PipelineObserver,
) -> Result<ProcessedFile> {
    let file_name = display_name(path);

    let file = File::open(path).map_err(|e| RelayError::io(path, e))?;

    // One store connection per file; a connection failure abandons the file.
    let store = EnrichStore::connect(&ctx.database).await?;

    let mut record = extract_record(BufReader::new(file))?;

    let Some(side) = record.side else {
        return Err(RelayError::UnknownSide {
            program: record.program,
        });
    };
    let operation_id = ctx.operation_id(side);

    // A failed query is recoverable: the report still goes out, un-enriched.
    let enrichment = match store.lookup(&record.serial_number).await {
        Ok(enrichment) => enrichment,
        Err(e) => {
            warn!(
                serial = %record.serial_number,
                error = %e,
                "enrichment lookup failed, proceeding without"
            );
            Default::default()
        }
    };
    record.apply_enrichment(enrichment);

    info!(
        serial = %record.serial_number,
        status = %record.status,
        program = %record.program,
        side = %side,
        sequence = record.sequence.as_deref().unwrap_or(""),
        work_order = record.work_order.as_deref().unwrap_or(""),
        "record extracted"
    );

    observer.record_processed(&RecordEvent {
        id: Uuid::now_v7(),
        file_name: file_name.clone(),
        serial_number: record.serial_number.clone(),
        status: record.status.clone(),
        program: record.program.clone(),
        side,
        work_order: record.work_order.clone(),
        sequence: record.sequence.clone(),
        processed_at: Utc::now(),
    });

    let report_path = aoirelay_report::write_report(
        &ctx.output_dir,
        &record,
        operation_id,
        &ctx.operation_duration,
        Local::now(),
    )?;

    Ok(ProcessedFile {
        file_name,
        serial_number: record.serial_number,
        report_path,
    })
}

/// Best-effort human-readable name for a path.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
