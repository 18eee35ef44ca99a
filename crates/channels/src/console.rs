//! Console sink: prints rendered turns to stdout.
//!
//! Used when no Slack credentials are configured. Each batch is framed by
//! rule lines so consecutive turns stay readable in a terminal.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use turnpost_core::error::SinkError;
use turnpost_core::sink::Sink;
use turnpost_core::turn::{Batch, RenderedUnit, ToolDetails};

const RULE: &str = "-------------";

/// Writes batches as plain text.
pub struct ConsoleSink<W = std::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Plain-text lines for one unit.
pub fn console_lines(unit: &RenderedUnit) -> Vec<String> {
    match unit {
        RenderedUnit::Text { text } => vec![text.clone()],
        RenderedUnit::ToolUse { name, input } => {
            let mut lines = vec![format!("Tool executed: {name}")];
            lines.extend(input.as_deref().map(input_line));
            lines
        }
        RenderedUnit::ToolExecuted {
            name,
            input,
            output,
            details,
        } => {
            let mut lines = vec![format!("Tool executed: {name}")];
            match details {
                ToolDetails::Hidden => lines.push("(details hidden)".into()),
                ToolDetails::Shown => {
                    lines.extend(input.as_deref().map(input_line));
                    if let Some(output) = output {
                        lines.push(format!("Output:\n```\n{output}\n```"));
                    }
                }
            }
            lines
        }
    }
}

fn input_line(input: &str) -> String {
    if input.starts_with("```") {
        format!("Input:\n{input}")
    } else {
        format!("Input: {input}")
    }
}

/// The full console rendering of a batch, rules included.
pub fn render_batch(batch: &Batch) -> String {
    let mut text = String::new();
    text.push_str(RULE);
    text.push('\n');
    for line in batch.units.iter().flat_map(console_lines) {
        text.push_str(&line);
        text.push('\n');
    }
    text.push_str(RULE);
    text.push('\n');
    text
}

#[async_trait]
impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn emit(&self, batch: &Batch) -> Result<(), SinkError> {
        let rendered = render_batch(batch);
        let mut out = self.out.lock().map_err(|_| SinkError::DeliveryFailed {
            sink: "console".into(),
            reason: "output lock poisoned".into(),
        })?;
        out.write_all(rendered.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
