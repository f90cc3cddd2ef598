//! GenericTester report rendering and writing.
//!
//! The report document is a frozen contract with downstream consumers:
//! element names, attribute names, attribute order, and the two timestamp
//! formats must be reproduced exactly. Rendering is pure; writing creates
//! the output directory on demand and never overwrites an existing report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use aoirelay_shared::{InputRecord, RelayError, Result};

/// Fixed suffix embedded in every report file name.
pub const REPORT_SUFFIX: &str = "GenericTester";

/// Timestamp format embedded in report file names.
const FILE_STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Timestamp format used inside the report body.
const BODY_STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The report file name for a serial at a generation time:
/// `<yyyyMMddHHmmss>_<serial>_GenericTester.xml`.
pub fn report_file_name(generated_at: DateTime<Local>, serial: &str) -> String {
    format!(
        "{}_{}_{}.xml",
        generated_at.format(FILE_STAMP_FORMAT),
        serial,
        REPORT_SUFFIX
    )
}

/// Render the report body for an enriched record.
///
/// Enrichment fields that were never resolved render as empty attribute
/// values.
pub fn render_report(
    record: &InputRecord,
    operation_id: &str,
    operation_duration: &str,
    generated_at: DateTime<Local>,
) -> String {
    let stamp = generated_at.format(BODY_STAMP_FORMAT).to_string();

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <GenericTester xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xmlns:xsd=\"http://www.w3.org/2001/XMLSchema-instance\" \
         RecipeId=\"{recipe}\" \
         UserLogin=\"User\" \
         WorkOrderId=\"{work_order}\" \
         OperationId=\"{operation}\" \
         LoopTimestamp=\"{stamp}\" \
         xmlns=\"Valor.GenericTester.xsd\">\n\
         <BoardTestResult BarcodeId=\"{barcode}\" \
         StatusCode=\"{status}\" \
         BoardTestStartTimestamp=\"{stamp}\" \
         OperationDuration=\"{duration}\" \
         Sequence=\"{sequence}\" />\n\
         </GenericTester>\n",
        recipe = escape_attr(&record.program),
        work_order = escape_attr(record.work_order.as_deref().unwrap_or("")),
        operation = escape_attr(operation_id),
        barcode = escape_attr(&record.serial_number),
        status = escape_attr(record.status.as_str()),
        duration = escape_attr(operation_duration),
        sequence = escape_attr(record.sequence.as_deref().unwrap_or("")),
    )
}

/// Write a report into `output_dir`, creating the directory if absent.
/// Returns the path written.
///
/// A same-second collision for the same serial gets a numeric
/// disambiguator before the extension instead of silently overwriting the
/// earlier report.
pub fn write_report(
    output_dir: &Path,
    record: &InputRecord,
    operation_id: &str,
    operation_duration: &str,
    generated_at: DateTime<Local>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| RelayError::write(output_dir, e))?;

    let body = render_report(record, operation_id, operation_duration, generated_at);
    let target = available_path(
        output_dir,
        &report_file_name(generated_at, &record.serial_number),
    );

    std::fs::write(&target, body).map_err(|e| RelayError::write(&target, e))?;
    info!(path = %target.display(), serial = %record.serial_number, "report written");

    Ok(target)
}

/// First non-existing path for `file_name` in `dir`, disambiguating with
/// `_1`, `_2`, … before the extension.
fn available_path(dir: &Path, file_name: &str) -> PathBuf {
    let target = dir.join(file_name);
    if !target.exists() {
        return target;
    }

    let stem = file_name.strip_suffix(".xml").unwrap_or(file_name);
    for n in 1u32.. {
        let candidate = dir.join(format!("{stem}_{n}.xml"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("ran out of disambiguating suffixes")
}

/// Minimal attribute escaping. Values that need none are byte-identical to
/// the historical output.
fn escape_attr(value: &str) -> String {
    if !value.contains(['&', '<', '>', '"']) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
