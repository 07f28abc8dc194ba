//! Append-only JSONL writer/reader plus the grind liveness probe.

use super::types::GrindEvent;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("io error on event log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A handle onto one `grind-events.jsonl` file. Writers always append;
/// readers are tolerant of malformed lines (SPEC_FULL §4.I, §8).
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EventLog { path: path.into() }
    }

    /// Append one event as a single JSON line. Never rewrites existing content.
    pub fn append(&self, event: &GrindEvent) -> Result<(), EventLogError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EventLogError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| EventLogError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let line = serde_json::to_string(event).unwrap_or_else(|_| {
            serde_json::to_string(&GrindEvent::synthetic_placeholder(Utc::now(), "unknown"))
                .expect("synthetic placeholder always serializes")
        });
        writeln!(file, "{line}").map_err(|source| EventLogError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Read every event in the log. A malformed line is replaced by one
    /// synthetic `grind_end` placeholder rather than aborting the read.
    pub fn read_all(&self) -> Result<Vec<GrindEvent>, EventLogError> {
        read_events(&self.path)
    }
}

fn read_events(path: &Path) -> Result<Vec<GrindEvent>, EventLogError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(EventLogError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(path = %path.display(), lineno, error = %err, "failed to read event log line, substituting placeholder");
                events.push(GrindEvent::synthetic_placeholder(Utc::now(), "unknown"));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<GrindEvent>(&line) {
            Ok(event) => events.push(event),
            Err(err) => {
                tracing::warn!(path = %path.display(), lineno, error = %err, "malformed event log line, substituting placeholder");
                events.push(GrindEvent::synthetic_placeholder(Utc::now(), "unknown"));
            }
        }
    }
    Ok(events)
}

/// "Is the grind still running": true when the most recent `grind_start` has
/// no matching `grind_end` and, if it recorded a `pid`, that process still
/// exists (signal-0 probe via `kill -0`). A start with no `pid` is treated as
/// running until a matching end shows up.
pub fn is_grind_running(events: &[GrindEvent]) -> bool {
    let mut last_start: Option<(&str, Option<u32>)> = None;
    let mut ended: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for event in events {
        match event {
            GrindEvent::GrindStart { batch, pid, .. } => {
                last_start = Some((batch.as_str(), *pid));
            }
            GrindEvent::GrindEnd { batch, .. } => {
                ended.insert(batch.as_str());
            }
            _ => {}
        }
    }

    let Some((batch, pid)) = last_start else {
        return false;
    };
    if ended.contains(batch) {
        return false;
    }
    match pid {
        Some(pid) => process_alive(pid),
        None => true,
    }
}

fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
