//! Renderer: turns classified turn content into [`RenderedUnit`]s.
//!
//! Tool input is schema-free, so [`format_tool_input`] probes it through an
//! ordered chain of typed decodes and takes the first that fits:
//!
//! 1. an object with a string `command` → the command alone, as inline code;
//! 2. any other object → pretty-printed JSON in a code fence;
//! 3. a JSON string → the string, as inline code;
//! 4. anything else → the raw text, trimmed, as inline code.
//!
//! Empty input renders as `N/A`. No step can fail.

use serde_json::{Map, Value};
use turnpost_core::turn::{RenderedUnit, ToolDetails};

use crate::correlator::PendingToolInvocation;

/// Controls which tool information reaches the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Include formatted input with announced tool uses.
    pub show_tool_input: bool,
    /// Emit a unit when a tool is invoked, before its result arrives.
    pub announce_tool_use: bool,
    /// How completed tool executions are presented.
    pub tool_details: ToolDetails,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_tool_input: false,
            announce_tool_use: true,
            tool_details: ToolDetails::Hidden,
        }
    }
}

/// Format tool input for display. See the module docs for the rules.
pub fn format_tool_input(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "N/A".into();
    }

    if let Some(command) = command_of(raw) {
        return format!("`{command}`");
    }
    if let Some(pretty) = pretty_object(raw) {
        return format!("```\n{pretty}\n```");
    }
    if let Ok(text) = serde_json::from_str::<String>(raw) {
        return format!("`{text}`");
    }
    format!("`{raw}`")
}

fn command_of(raw: &str) -> Option<String> {
    let map: Map<String, Value> = serde_json::from_str(raw).ok()?;
    match map.get("command") {
        Some(Value::String(command)) => Some(command.clone()),
        _ => None,
    }
}

fn pretty_object(raw: &str) -> Option<String> {
    let map: Map<String, Value> = serde_json::from_str(raw).ok()?;
    serde_json::to_string_pretty(&map).ok()
}

/// Input section for a tool unit; `None` when there is nothing worth showing.
fn input_section(invocation: &PendingToolInvocation) -> Option<String> {
    let raw = invocation.input_json().trim();
    if raw.is_empty() || serde_json::from_str::<Value>(raw).is_err() {
        return None;
    }
    Some(format_tool_input(raw))
}

/// A text segment; `None` if it is blank after trimming.
pub fn render_text(text: &str) -> Option<RenderedUnit> {
    let text = text.trim();
    (!text.is_empty()).then(|| RenderedUnit::text(text))
}

/// A tool invocation that has not completed yet.
pub fn render_tool_use(invocation: &PendingToolInvocation, options: &RenderOptions) -> RenderedUnit {
    RenderedUnit::ToolUse {
        name: invocation.name.clone(),
        input: options
            .show_tool_input
            .then(|| input_section(invocation))
            .flatten(),
    }
}

/// A tool invocation matched with its result.
pub fn render_tool_executed(invocation: &PendingToolInvocation, options: &RenderOptions) -> RenderedUnit {
    let shown = options.tool_details == ToolDetails::Shown;
    let output = invocation
        .output
        .as_deref()
        .map(str::trim_end)
        .filter(|out| !out.trim().is_empty());

    RenderedUnit::ToolExecuted {
        name: invocation.name.clone(),
        input: if shown { input_section(invocation) } else { None },
        output: if shown { output.map(str::to_owned) } else { None },
        details: options.tool_details,
    }
}
