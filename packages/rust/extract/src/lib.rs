//! AOI result-file extraction.
//!
//! An input file is a newline-delimited, comma-separated key/value table:
//! - `Barcode,<serial>`
//! - `Result,<verdict>` (`Good` → PASS, `NG` → FAIL, anything else verbatim)
//! - `Program Name,<program>` (also derives the board side)
//!
//! Only the first two fields of a line are significant; other keys are
//! ignored, short lines are skipped, and repeated keys are last-value-wins.
//! This is the most failure-prone step of the pipeline: malformed or
//! truncated machine output is expected input, not a defect.

use std::io::BufRead;

use tracing::trace;

use aoirelay_shared::{InputRecord, RelayError, Result, Side, TestStatus};

/// Key carrying the serial number.
const KEY_BARCODE: &str = "Barcode";
/// Key carrying the test verdict.
const KEY_RESULT: &str = "Result";
/// Key carrying the program name.
const KEY_PROGRAM: &str = "Program Name";

/// Extract a record from one input stream.
///
/// Fails with the `Extraction` kind when the stream ends without all of
/// `Barcode`, `Result`, and `Program Name` having been seen, or when the
/// stream itself becomes unreadable mid-file.
pub fn extract_record<R: BufRead>(reader: R) -> Result<InputRecord> {
    let mut serial: Option<String> = None;
    let mut status: Option<TestStatus> = None;
    let mut program: Option<String> = None;
    let mut side: Option<Side> = None;

    for line in reader.lines() {
        let line =
            line.map_err(|e| RelayError::extraction(format!("unreadable input line: {e}")))?;

        // Key and value only; any trailing fields are irrelevant.
        let mut fields = line.splitn(3, ',');
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            trace!(line = %line, "skipping line with fewer than two fields");
            continue;
        };

        let key = key.trim();
        let value = value.trim();

        match key {
            KEY_BARCODE => serial = Some(value.to_string()),
            KEY_RESULT => status = Some(TestStatus::from_result_value(value)),
            KEY_PROGRAM => {
                program = Some(value.to_string());
                side = Side::from_program(value);
            }
            _ => {}
        }
    }

    match (serial, status, program) {
        (Some(serial_number), Some(status), Some(program)) => Ok(InputRecord {
            serial_number,
            status,
            program,
            side,
            sequence: None,
            work_order: None,
        }),
        (serial, status, program) => {
            let mut missing = Vec::new();
            if serial.is_none() {
                missing.push(KEY_BARCODE);
            }
            if status.is_none() {
                missing.push(KEY_RESULT);
            }
            if program.is_none() {
                missing.push(KEY_PROGRAM);
            }
            Err(RelayError::extraction(format!(
                "required fields missing: {}",
                missing.join(", ")
            )))
        }
    }
}
