//! The six fixed event kinds (SPEC_FULL §4.I, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrindEvent {
    GrindStart {
        ts: DateTime<Utc>,
        batch: String,
        tasks: Vec<String>,
        parallelism: u32,
        models: HashMap<String, u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
    },
    GrindEnd {
        ts: DateTime<Utc>,
        batch: String,
        success: bool,
    },
    TaskStart {
        ts: DateTime<Utc>,
        #[serde(rename = "taskId")]
        task_id: String,
        task: String,
        model: String,
    },
    TaskComplete {
        ts: DateTime<Utc>,
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sha: Option<String>,
        model: String,
        attempts: u32,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    TaskFailed {
        ts: DateTime<Utc>,
        #[serde(rename = "taskId")]
        task_id: String,
        error: String,
        #[serde(rename = "errorCategory", skip_serializing_if = "Option::is_none")]
        error_category: Option<String>,
    },
    TaskEscalated {
        ts: DateTime<Utc>,
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(rename = "fromModel")]
        from_model: String,
        #[serde(rename = "toModel")]
        to_model: String,
    },
}

impl GrindEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            GrindEvent::GrindStart { ts, .. }
            | GrindEvent::GrindEnd { ts, .. }
            | GrindEvent::TaskStart { ts, .. }
            | GrindEvent::TaskComplete { ts, .. }
            | GrindEvent::TaskFailed { ts, .. }
            | GrindEvent::TaskEscalated { ts, .. } => *ts,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            GrindEvent::GrindStart { .. } => "grind_start",
            GrindEvent::GrindEnd { .. } => "grind_end",
            GrindEvent::TaskStart { .. } => "task_start",
            GrindEvent::TaskComplete { .. } => "task_complete",
            GrindEvent::TaskFailed { .. } => "task_failed",
            GrindEvent::TaskEscalated { .. } => "task_escalated",
        }
    }

    /// A synthetic placeholder substituted for one malformed JSONL line, so a
    /// single corrupt entry never aborts a reader (SPEC_FULL §4.I, §8).
    pub fn synthetic_placeholder(ts: DateTime<Utc>, batch: &str) -> Self {
        GrindEvent::GrindEnd {
            ts,
            batch: batch.to_string(),
            success: false,
        }
    }
}
