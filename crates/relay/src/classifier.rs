//! Turn classifier: sorts a payload's content items into turn events.

use serde_json::value::RawValue;
use turnpost_core::record::ContentItem;

/// What a content item means for the relay.
#[derive(Debug, Clone, Copy)]
pub enum TurnEvent<'a> {
    /// Non-blank text, trimmed.
    Text(&'a str),
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: Option<&'a RawValue>,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
    },
}

/// Partition `content` into events, preserving order.
///
/// Blank text, tool results without a `tool_use_id`, and unknown item
/// kinds produce no event.
pub fn classify(content: &[ContentItem]) -> Vec<TurnEvent<'_>> {
    content
        .iter()
        .filter_map(|item| match item {
            ContentItem::Text { text } => {
                let text = text.trim();
                (!text.is_empty()).then_some(TurnEvent::Text(text))
            }
            ContentItem::ToolUse { id, name, input } => Some(TurnEvent::ToolUse {
                id,
                name,
                input: input.as_deref(),
            }),
            ContentItem::ToolResult {
                tool_use_id,
                content,
            } if !tool_use_id.is_empty() => Some(TurnEvent::ToolResult {
                tool_use_id,
                content,
            }),
            _ => None,
        })
        .collect()
}
