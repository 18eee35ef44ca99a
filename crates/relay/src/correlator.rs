//! Tool correlator: matches tool results back to their invocations.
//!
//! Every `tool_use` is parked here under its id until a `tool_result` with
//! the same `tool_use_id` arrives. Entries are removed only when matched;
//! there is no eviction, so unmatched invocations live as long as the
//! session does.

use std::collections::HashMap;

use serde_json::value::RawValue;
use tracing::{debug, warn};

/// A tool invocation waiting for its result.
#[derive(Debug, Clone)]
pub struct PendingToolInvocation {
    pub id: String,
    pub name: String,
    /// Input as it appeared on the wire.
    pub input: Option<Box<RawValue>>,
    /// Filled in when the matching result arrives.
    pub output: Option<String>,
}

impl PendingToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Option<Box<RawValue>>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            output: None,
        }
    }

    /// Raw input text, empty when the invocation carried none.
    pub fn input_json(&self) -> &str {
        self.input.as_deref().map(RawValue::get).unwrap_or_default()
    }
}

/// In-flight tool invocations keyed by id.
#[derive(Debug, Default)]
pub struct ToolCorrelator {
    pending: HashMap<String, PendingToolInvocation>,
}

impl ToolCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an invocation. A second invocation with the same id replaces
    /// the first, which is returned.
    pub fn register(&mut self, invocation: PendingToolInvocation) -> Option<PendingToolInvocation> {
        if invocation.id.is_empty() {
            debug!(tool = %invocation.name, "Tool use without id cannot be correlated");
            return None;
        }

        let replaced = self.pending.insert(invocation.id.clone(), invocation);
        if let Some(old) = &replaced {
            warn!(tool_use_id = %old.id, tool = %old.name, "Replacing pending tool invocation with the same id");
        }
        replaced
    }

    /// Attach `output` to the invocation `tool_use_id` and take it out of
    /// the pending set. Returns `None` when nothing is waiting on that id.
    pub fn complete(&mut self, tool_use_id: &str, output: impl Into<String>) -> Option<PendingToolInvocation> {
        let mut invocation = self.pending.remove(tool_use_id)?;
        invocation.output = Some(output.into());
        Some(invocation)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
