//! JSON/JSONL bulk import loader (spec §6): accepts either a JSON array
//! of memory records or newline-delimited JSON objects, back-fills
//! zero/epoch timestamps with the current time, and skips records whose
//! content is blank after trimming.

use chrono::{DateTime, TimeZone, Utc};

use memory_core::errors::{MemoryError, MemoryResult};
use memory_core::model::MemoryRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub parsed: usize,
    pub blank_skipped: usize,
    pub timestamps_backfilled: usize,
    pub records: Vec<MemoryRecord>,
}

/// Whether a timestamp is the unix epoch — the "zero" value a
/// loosely-typed export tool would emit for a missing/unset field,
/// distinct from `MemoryRecord::default()`'s own `now()`-based default.
fn is_epoch(ts: DateTime<Utc>) -> bool {
    ts == Utc.timestamp_opt(0, 0).single().expect("epoch is representable")
}

/// Parse either a JSON array of records or JSONL (one record per
/// non-blank line), auto-detected by the first non-whitespace byte:
/// `[` means a JSON array, anything else means JSONL.
pub fn parse_import(text: &str) -> MemoryResult<ImportReport> {
    let trimmed = text.trim_start();
    let raw_records: Vec<MemoryRecord> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(MemoryError::from)?
    } else {
        let mut records = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: MemoryRecord = serde_json::from_str(line).map_err(|e| {
                MemoryError::InvalidInput(format!("line {}: {e}", line_no + 1))
            })?;
            records.push(record);
        }
        records
    };

    let mut report = ImportReport {
        parsed: raw_records.len(),
        ..Default::default()
    };

    for mut record in raw_records {
        if !record.has_valid_content() {
            report.blank_skipped += 1;
            continue;
        }

        let now = Utc::now();
        let mut backfilled = false;
        if is_epoch(record.created_at) {
            record.created_at = now;
            backfilled = true;
        }
        if is_epoch(record.updated_at) {
            record.updated_at = now;
            backfilled = true;
        }
        if is_epoch(record.last_accessed) {
            record.last_accessed = now;
            backfilled = true;
        }
        if backfilled {
            report.timestamps_backfilled += 1;
        }

        report.records.push(record);
    }

    Ok(report)
}
