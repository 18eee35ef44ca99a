//! Turn session: per-process state that carries classified turns through
//! correlation and rendering.

use tracing::debug;
use turnpost_core::record::Record;
use turnpost_core::turn::RenderedUnit;

use crate::classifier::{TurnEvent, classify};
use crate::correlator::{PendingToolInvocation, ToolCorrelator};
use crate::render::{RenderOptions, render_text, render_tool_executed, render_tool_use};

/// Owns the tool correlator for one relay run.
#[derive(Debug, Default)]
pub struct TurnSession {
    correlator: ToolCorrelator,
    options: RenderOptions,
}

impl TurnSession {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            correlator: ToolCorrelator::new(),
            options,
        }
    }

    pub fn correlator(&self) -> &ToolCorrelator {
        &self.correlator
    }

    /// Classify, correlate, and render one record.
    ///
    /// Text is only relayed from assistant records; user text is the
    /// operator's own prompt. Tool uses and results are handled for both.
    pub fn process(&mut self, record: &Record) -> Vec<RenderedUnit> {
        let relay_text = matches!(record, Record::Assistant(_));
        let mut units = Vec::new();

        for event in classify(record.content()) {
            match event {
                TurnEvent::Text(text) if relay_text => units.extend(render_text(text)),
                TurnEvent::Text(_) => debug!(kind = record.kind(), "Skipping text from non-assistant record"),
                TurnEvent::ToolUse { id, name, input } => {
                    let invocation = PendingToolInvocation::new(id, name, input.map(ToOwned::to_owned));
                    if self.options.announce_tool_use {
                        units.push(render_tool_use(&invocation, &self.options));
                    }
                    debug!(tool_use_id = %id, tool = %name, "Tool invoked");
                    self.correlator.register(invocation);
                }
                TurnEvent::ToolResult {
                    tool_use_id,
                    content,
                } => match self.correlator.complete(tool_use_id, content) {
                    Some(done) => {
                        debug!(tool_use_id = %tool_use_id, tool = %done.name, "Tool completed");
                        units.push(render_tool_executed(&done, &self.options));
                    }
                    None => debug!(tool_use_id = %tool_use_id, "Dropping unmatched tool result"),
                },
            }
        }

        units
    }
}
