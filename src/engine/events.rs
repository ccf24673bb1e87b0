//! Append-only audit log of apply events, one JSON object per line

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::ApplyEvent;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::executor::SystemOutcome;

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    timestamp: DateTime<Utc>,
    system: &'static str,
    #[serde(flatten)]
    event: &'a ApplyEvent,
}

/// Append the events of every outcome to `path`; returns how many were written
pub fn append(path: &Path, outcomes: &[SystemOutcome]) -> Result<usize> {
    let timestamp = Utc::now();
    let mut lines = String::new();
    let mut count = 0;

    for outcome in outcomes {
        for event in &outcome.events {
            let record = AuditRecord {
                timestamp,
                system: outcome.system.name(),
                event,
            };
            lines.push_str(&serde_json::to_string(&record).context("Failed to encode event")?);
            lines.push('\n');
            count += 1;
        }
    }

    if count == 0 {
        return Ok(0);
    }

    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open events log: {}", path.display()))?;
    file.write_all(lines.as_bytes())
        .with_context(|| format!("Failed to write events log: {}", path.display()))?;

    log::debug!("Appended {count} events to {}", path.display());
    Ok(count)
}
