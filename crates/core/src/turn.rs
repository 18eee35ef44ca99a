//! Rendered turn units: the presentation-neutral output of the relay.
//!
//! The relay reduces every payload to a [`Batch`] of [`RenderedUnit`]s.
//! Sinks decide how a unit looks on their medium (console lines, Slack
//! blocks); all text inside a unit is already formatted.

use serde::{Deserialize, Serialize};

/// Whether a completed tool execution shows its input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolDetails {
    /// Header plus a "details hidden" marker.
    #[default]
    Hidden,
    /// Header, input, and output.
    Shown,
}

/// One renderable piece of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderedUnit {
    /// Assistant text, trimmed.
    Text { text: String },

    /// A tool invocation whose result has not arrived yet.
    ToolUse {
        name: String,
        /// Formatted input; `None` when input display is off or unusable.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },

    /// A tool invocation matched with its result.
    ToolExecuted {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        details: ToolDetails,
    },
}

impl RenderedUnit {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Plain-text summary, used where rich layout is unavailable
    /// (e.g. Slack notification fallbacks).
    pub fn summary(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::ToolUse { name, .. } | Self::ToolExecuted { name, .. } => {
                format!("Tool executed: {name}")
            }
        }
    }
}

/// The units produced by one payload, delivered in a single emit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Batch {
    pub session_id: String,
    pub units: Vec<RenderedUnit>,
}

impl Batch {
    pub fn new(session_id: impl Into<String>, units: Vec<RenderedUnit>) -> Self {
        Self {
            session_id: session_id.into(),
            units,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Plain-text rendering of every unit, one paragraph each.
    pub fn summary(&self) -> String {
        self.units
            .iter()
            .map(RenderedUnit::summary)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
