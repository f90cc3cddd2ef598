//! The polling loop: list candidates, process each in sequence, wait, repeat.
//!
//! Cancellation is observed at cycle boundaries only — a file that has
//! begun processing runs to completion (or to its timeout) first. The
//! inter-cycle wait is an interruptible `select!`, so shutdown latency is
//! bounded by the slower of the current file and one poll interval rather
//! than by an uninterruptible sleep.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use aoirelay_shared::{RelayError, RunContext};

use crate::archive::archive_input;
use crate::pipeline::{PipelineObserver, display_name, process_file};

/// Input files must carry this extension (case-insensitive).
const INPUT_EXTENSION: &str = "csv";

/// Run the polling loop until `shutdown_rx` carries `true` (or its sender
/// is dropped).
///
/// Each cycle snapshots the current [`RunContext`] from `ctx_rx`; a
/// context published mid-cycle takes effect on the next one. An empty
/// listing still logs, waits, and retries — the loop never exits on
/// "no work found".
#[instrument(skip_all)]
pub async fn run_poller(
    mut ctx_rx: watch::Receiver<Arc<RunContext>>,
    mut shutdown_rx: watch::Receiver<bool>,
    observer: Arc<dyn PipelineObserver>,
) {
    loop {
        if *shutdown_rx.borrow() {
            info!("shutdown requested, stopping poller");
            break;
        }

        let ctx = ctx_rx.borrow_and_update().clone();

        let candidates = list_candidates(&ctx.input_dir);
        observer.cycle_started(candidates.len());

        if candidates.is_empty() {
            debug!(dir = %ctx.input_dir.display(), "no input files found");
        } else {
            info!(
                count = candidates.len(),
                dir = %ctx.input_dir.display(),
                "processing input files"
            );
        }

        for path in &candidates {
            run_one(&ctx, path, observer.as_ref()).await;
        }

        tokio::select! {
            _ = tokio::time::sleep(ctx.poll_interval) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    info!("shutdown channel closed, stopping poller");
                    break;
                }
            }
        }
    }
}

/// Process a single candidate and always archive it afterwards.
async fn run_one(ctx: &RunContext, path: &Path, observer: &dyn PipelineObserver) {
    let file_name = display_name(path);

    let outcome = match timeout(ctx.file_timeout, process_file(ctx, path, observer)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(RelayError::Timeout {
            file: file_name.clone(),
            seconds: ctx.file_timeout.as_secs(),
        }),
    };

    match outcome {
        Ok(processed) => {
            info!(
                file = %processed.file_name,
                serial = %processed.serial_number,
                report = %processed.report_path.display(),
                "file processed"
            );
        }
        Err(error) => {
            warn!(file = %file_name, error = %error, "file processing failed");
            observer.file_failed(&file_name, &error);
            match &error {
                RelayError::UnknownSide { program } => {
                    observer.notice(&format!(
                        "Unknown side in program name '{program}' for file {file_name}"
                    ));
                }
                _ => {
                    observer.notice(&format!("Error processing file {file_name}: {error}"));
                }
            }
        }
    }

    // Classification and processing failures are not fatal to the file's
    // lifecycle; the input directory must not accumulate attempted files.
    if let Err(error) = archive_input(&ctx.backup_dir, path) {
        warn!(file = %file_name, error = %error, "failed to archive input file");
        observer.file_failed(&file_name, &error);
    }
}

/// List candidate input files in directory order.
///
/// The order is whatever the filesystem returns; nothing downstream may
/// depend on it. An unreadable directory yields an empty cycle.
fn list_candidates(input_dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(input_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %input_dir.display(), error = %e, "cannot read input directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_input_extension(path))
        .collect()
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "aoirelay-poller-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_input_extension(Path::new("a/board.csv")));
        assert!(has_input_extension(Path::new("a/board.CSV")));
        assert!(has_input_extension(Path::new("a/board.Csv")));
        assert!(!has_input_extension(Path::new("a/board.txt")));
        assert!(!has_input_extension(Path::new("a/board")));
        assert!(!has_input_extension(Path::new("a/csv")));
    }

    #[test]
    fn listing_filters_to_input_files() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("one.csv"), "x").unwrap();
        std::fs::write(tmp.join("two.CSV"), "x").unwrap();
        std::fs::write(tmp.join("note.txt"), "x").unwrap();
        std::fs::create_dir(tmp.join("nested.csv")).unwrap();

        let mut names: Vec<_> = list_candidates(&tmp)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["one.csv", "two.CSV"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let tmp = temp_dir();
        let candidates = list_candidates(&tmp.join("does-not-exist"));
        assert!(candidates.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
