use anyhow::{Context, Result};
use chrono::Utc;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One operator action in the session audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub action: String,
    #[serde(default)]
    pub detail: String,
}

/// Append one row to the session journal, creating the file (with headers)
/// on first use.
pub fn append_event(path: &Path, action: &str, detail: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating journal dir {}", parent.display()))?;
        }
    }
    let write_header = !path.exists();
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening journal {}", path.display()))?;
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    if write_header {
        writer.write_record(["timestamp", "action", "detail"])?;
    }
    writer.write_record([Utc::now().to_rfc3339().as_str(), action, detail])?;
    writer.flush()?;
    Ok(())
}

pub fn read_events(path: &Path) -> Result<Vec<EventRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening journal {}", path.display()))?;
    let mut events = Vec::new();
    for row in reader.deserialize::<EventRecord>() {
        let parsed = row.with_context(|| format!("parsing journal {}", path.display()))?;
        events.push(parsed);
    }
    Ok(events)
}
