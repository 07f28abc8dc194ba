//! The agent-SDK abstraction boundary (SPEC_FULL §1, §9).
//!
//! The LLM agent SDK itself is out of scope — treated as an opaque lazy
//! stream of typed events. This module owns only the event shape and the
//! trait a Worker drives it through; nothing here knows about prompts,
//! providers, or models.
//!
//! Grounded on the spec's own event taxonomy (`system|assistant|user|result`)
//! and on the teacher corpus's tool-use/tool-result id-matching idiom (seen
//! in `agents/coder.rs` and `state_machine.rs`'s iteration records), not on
//! any concrete agent-SDK binding.

use serde_json::Value;

/// Token usage for a single agent invocation, as reported by the SDK
/// (SPEC_FULL §4.E "Token accounting").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }
}

/// Tool names the Worker treats as write operations (SPEC_FULL §4.E step 2).
pub const WRITE_TOOLS: &[&str] = &["Write", "Edit", "NotebookEdit"];

/// One event in the lazy stream the agent SDK produces. The Worker must not
/// assume events arrive atomically or in uninterrupted order; tool-use and
/// tool-result events are matched by `id` (SPEC_FULL §9).
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A system-level event (session start, model info, …); carried through
    /// unparsed beyond its subtype tag.
    System { subtype: String },
    /// A block of assistant text. Marker parsing (§4.E step 2) scans this.
    AssistantText { text: String },
    /// A tool invocation requested by the agent.
    ToolUse { id: String, name: String, input: Value },
    /// The result of a previously requested tool invocation, matched by id.
    ToolResult { tool_use_id: String, is_error: bool, content: String },
    /// The terminal event of an invocation, carrying final token usage.
    Result { usage: TokenUsage },
}

/// Whether a tool-result body indicates the requested write was a no-op
/// (SPEC_FULL §4.E step 2: "content already the same" / "no changes to make").
pub fn is_noop_result(content: &str) -> bool {
    let lower = content.to_lowercase();
    lower.contains("content already the same") || lower.contains("no changes to make")
}

/// One opaque streaming agent invocation. Implementations back this with
/// whatever transport the real SDK uses (threads, cooperative tasks,
/// callbacks) — the Worker only consumes [`AgentEvent`]s and issues stop
/// decisions through the contract in SPEC_FULL §6.
#[async_trait::async_trait]
pub trait AgentSession: Send {
    /// Pull the next event, or `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<AgentEvent>;

    /// Respond to a potential stop point (SPEC_FULL §6 "Worker stop-control
    /// contract"): `continue_ = false` forces the agent to keep working,
    /// carrying `reason` as the message shown to it.
    async fn respond_to_stop(&mut self, continue_: bool, reason: Option<String>);
}
