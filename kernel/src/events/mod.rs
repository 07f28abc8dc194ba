//! Append-only JSONL event log with tolerant reads and a PID-based liveness probe.
//!
//! Grounded on the teacher corpus's `events::types` tagged-enum shape, cut
//! down to the six event kinds SPEC_FULL §4.I / §6 actually specifies, and
//! backed by a plain append-only file rather than an in-process bus: nothing
//! in the spec calls for in-memory pub/sub, only a durable record plus a
//! liveness check over it.

mod log;
mod types;

pub use log::{is_grind_running, EventLog, EventLogError};
pub use types::GrindEvent;
