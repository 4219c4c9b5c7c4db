//! JSON-lines input files
//!
//! Each non-blank line is one record: `{"key": ..., "value": ..., "timestamp": ...}`.
//! `key` and `timestamp` are optional (keyless, timestamp 0). A JSON object or
//! number value is passed on in its JSON encoding; a JSON string value is passed
//! on as its raw text, so a line can carry a payload that is not JSON at all.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use processor::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CliError, CliResult};

/// One line of an input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: Value,
    #[serde(default)]
    pub timestamp: i64,
}

impl InputRecord {
    pub fn into_raw(self) -> CliResult<RawRecord> {
        let value = match self.value {
            Value::String(text) => text.into_bytes(),
            other => serde_json::to_vec(&other)?,
        };
        Ok(RawRecord::raw(self.key.map(String::into_bytes), value, self.timestamp))
    }
}

/// Parse JSON-lines text into records, in file order
pub fn parse_records(source: &str, text: &str) -> CliResult<Vec<RawRecord>> {
    let mut records = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input: InputRecord = serde_json::from_str(line).map_err(|e| CliError::Input {
            path: source.to_string(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(input.into_raw()?);
    }

    Ok(records)
}

/// Read a JSON-lines file into records
pub async fn read_records(path: &Path) -> CliResult<Vec<RawRecord>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_records(&path.display().to_string(), &text)
}

/// Split records into `partitions` groups, preserving order within each group.
///
/// Records with the same `partition_key` always go to the same group, picked
/// by a hash of the key. Records the function cannot place go to group 0,
/// where the topology's record-error policy deals with them.
pub fn partition_records<F>(
    records: Vec<RawRecord>,
    partitions: usize,
    partition_key: F,
) -> Vec<Vec<RawRecord>>
where
    F: Fn(&RawRecord) -> Option<Vec<u8>>,
{
    let partitions = partitions.max(1);
    let mut groups: Vec<Vec<RawRecord>> = (0..partitions).map(|_| Vec::new()).collect();

    for record in records {
        let group = partition_key(&record).map_or(0, |key| {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            (hasher.finish() % partitions as u64) as usize
        });
        groups[group].push(record);
    }

    groups
}
