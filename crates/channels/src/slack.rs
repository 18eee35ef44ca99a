//! Slack sink: posts each batch into a thread via `chat.postMessage`.
//!
//! Batches are laid out with Block Kit. The plain-text `text` field carries
//! the batch summary so notifications and clients without block support
//! still show something sensible.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use turnpost_config::SlackTarget;
use turnpost_core::error::SinkError;
use turnpost_core::sink::Sink;
use turnpost_core::turn::{Batch, RenderedUnit, ToolDetails};

/// Slack rejects `text` objects longer than this.
pub const MAX_TEXT_CHARS: usize = 3000;

/// Slack rejects messages with more blocks than this.
pub const MAX_BLOCKS: usize = 50;

const SINK_NAME: &str = "slack";

/// Posts batches to one Slack thread.
pub struct SlackSink {
    target: SlackTarget,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(target: SlackTarget) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::DeliveryFailed {
                sink: SINK_NAME.into(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { target, client })
    }

    pub fn target(&self) -> &SlackTarget {
        &self.target
    }

    fn endpoint(&self) -> String {
        format!("{}/chat.postMessage", self.target.api_url)
    }
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    thread_ts: &'a str,
    text: String,
    blocks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Clip formatted code (inline or fenced) inside its markers, so the closing
/// backticks survive.
fn clip_code(text: &str, limit: usize) -> String {
    for fence in ["```", "`"] {
        if let Some(body) = text
            .strip_prefix(fence)
            .and_then(|rest| rest.strip_suffix(fence))
        {
            let room = limit.saturating_sub(2 * fence.len());
            return format!("{fence}{}{fence}", clip(body, room));
        }
    }
    clip(text, limit)
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": clip(text, MAX_TEXT_CHARS) }
    })
}

fn context(text: &str) -> Value {
    json!({
        "type": "context",
        "elements": [{ "type": "mrkdwn", "text": clip(text, MAX_TEXT_CHARS) }]
    })
}

/// Block Kit blocks for one unit.
pub fn unit_blocks(unit: &RenderedUnit) -> Vec<Value> {
    match unit {
        RenderedUnit::Text { text } => vec![section(text)],
        RenderedUnit::ToolUse { name, input } => {
            let mut text = format!("🔧 *Tool*: {name}");
            if let Some(input) = input {
                let room = MAX_TEXT_CHARS.saturating_sub(text.chars().count() + 20);
                text.push_str(&format!("\n*Input*: {}", clip_code(input, room)));
            }
            vec![context(&text)]
        }
        RenderedUnit::ToolExecuted {
            name,
            input,
            output,
            details,
        } => {
            let mut blocks = vec![section(&format!("*Tool executed:* {name}"))];
            match details {
                ToolDetails::Hidden => blocks.push(context("_Details hidden_")),
                ToolDetails::Shown => {
                    if let Some(input) = input {
                        let input = clip_code(input, MAX_TEXT_CHARS - 20);
                        blocks.push(section(&format!("*Input*: {input}")));
                    }
                    if let Some(output) = output {
                        // Leave room for the label and fence.
                        let body = clip(output, MAX_TEXT_CHARS - 20);
                        blocks.push(section(&format!("*Output*:\n```{body}```")));
                    }
                }
            }
            blocks
        }
    }
}

/// Block Kit blocks for a whole batch, capped at [`MAX_BLOCKS`].
pub fn slack_blocks(batch: &Batch) -> Vec<Value> {
    let mut blocks: Vec<Value> = batch.units.iter().flat_map(unit_blocks).collect();
    if blocks.len() > MAX_BLOCKS {
        warn!(
            blocks = blocks.len(),
            limit = MAX_BLOCKS,
            "Batch exceeds Slack block limit; dropping trailing blocks"
        );
        blocks.truncate(MAX_BLOCKS);
    }
    blocks
}

#[async_trait]
impl Sink for SlackSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn emit(&self, batch: &Batch) -> Result<(), SinkError> {
        let body = PostMessage {
            channel: &self.target.channel_id,
            thread_ts: &self.target.thread_ts,
            text: clip(&batch.summary(), MAX_TEXT_CHARS),
            blocks: slack_blocks(batch),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.target.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::DeliveryFailed {
                sink: SINK_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SinkError::DeliveryFailed {
                sink: SINK_NAME.into(),
                reason: format!("HTTP {}: {error_body}", status.as_u16()),
            });
        }

        let reply: SlackResponse = response
            .json()
            .await
            .map_err(|e| SinkError::DeliveryFailed {
                sink: SINK_NAME.into(),
                reason: format!("unreadable response: {e}"),
            })?;

        if !reply.ok {
            return Err(SinkError::Api {
                sink: SINK_NAME.into(),
                code: reply.error.unwrap_or_else(|| "unknown_error".into()),
            });
        }

        debug!(
            channel = %self.target.channel_id,
            units = batch.units.len(),
            "Posted batch to Slack"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::header::AUTHORIZATION;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn post_message(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let reply = if body["channel"] == "C-missing" {
            json!({ "ok": false, "error": "channel_not_found" })
        } else {
            json!({ "ok": true, "ts": "1700000000.000200" })
        };
        captured.requests.lock().unwrap().push((auth, body));
        Json(reply)
    }

    async fn spawn_stub() -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route("/api/chat.postMessage", post(post_message))
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/api"), captured)
    }

    fn target(api_url: &str, channel: &str) -> SlackTarget {
        SlackTarget {
            bot_token: "xoxb-test".into(),
            channel_id: channel.into(),
            thread_ts: "1700000000.000100".into(),
            api_url: api_url.into(),
        }
    }

    #[test]
    fn text_becomes_mrkdwn_section() {
        let blocks = unit_blocks(&RenderedUnit::text("Hello"));
        assert_eq!(
            blocks,
            vec![json!({"type": "section", "text": {"type": "mrkdwn", "text": "Hello"}})]
        );
    }

    #[test]
    fn tool_use_becomes_context() {
        let blocks = unit_blocks(&RenderedUnit::ToolUse {
            name: "bash".into(),
            input: Some("`ls`".into()),
        });
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["type"], "context");
        assert_eq!(
            blocks[0]["elements"][0]["text"],
            "🔧 *Tool*: bash\n*Input*: `ls`"
        );

        let bare = unit_blocks(&RenderedUnit::ToolUse {
            name: "bash".into(),
            input: None,
        });
        assert_eq!(bare[0]["elements"][0]["text"], "🔧 *Tool*: bash");
    }

    #[test]
    fn executed_tool_hidden_details() {
        let blocks = unit_blocks(&RenderedUnit::ToolExecuted {
            name: "bash".into(),
            input: None,
            output: None,
            details: ToolDetails::Hidden,
        });
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["text"]["text"], "*Tool executed:* bash");
        assert_eq!(blocks[1]["elements"][0]["text"], "_Details hidden_");
    }

    #[test]
    fn executed_tool_shown_details() {
        let blocks = unit_blocks(&RenderedUnit::ToolExecuted {
            name: "bash".into(),
            input: Some("`ls`".into()),
            output: Some("a.txt".into()),
            details: ToolDetails::Shown,
        });
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1]["text"]["text"], "*Input*: `ls`");
        assert_eq!(blocks[2]["text"]["text"], "*Output*:\n```a.txt```");
    }

    #[test]
    fn long_text_is_clipped() {
        let long = "x".repeat(MAX_TEXT_CHARS + 500);
        let blocks = unit_blocks(&RenderedUnit::text(long));
        let text = blocks[0]["text"]["text"].as_str().unwrap();
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS);
        assert!(text.ends_with('…'));

        let output = unit_blocks(&RenderedUnit::ToolExecuted {
            name: "bash".into(),
            input: None,
            output: Some("y".repeat(10_000)),
            details: ToolDetails::Shown,
        });
        let text = output[1]["text"]["text"].as_str().unwrap();
        assert!(text.chars().count() <= MAX_TEXT_CHARS);
        assert!(text.ends_with("…```"));
    }

    #[test]
    fn long_fenced_input_keeps_its_closing_fence() {
        let fenced = format!("```\n{{\n  \"data\": \"{}\"\n}}\n```", "z".repeat(5000));
        let executed = unit_blocks(&RenderedUnit::ToolExecuted {
            name: "write".into(),
            input: Some(fenced.clone()),
            output: None,
            details: ToolDetails::Shown,
        });
        let text = executed[1]["text"]["text"].as_str().unwrap();
        assert!(text.chars().count() <= MAX_TEXT_CHARS);
        assert!(text.starts_with("*Input*: ```\n{"));
        assert!(text.ends_with("…```"));

        let announced = unit_blocks(&RenderedUnit::ToolUse {
            name: "write".into(),
            input: Some(fenced),
        });
        let text = announced[0]["elements"][0]["text"].as_str().unwrap();
        assert!(text.chars().count() <= MAX_TEXT_CHARS);
        assert!(text.ends_with("…```"));
    }

    #[test]
    fn long_inline_input_keeps_its_backticks() {
        let inline = format!("`{}`", "ls ".repeat(2000));
        let blocks = unit_blocks(&RenderedUnit::ToolExecuted {
            name: "bash".into(),
            input: Some(inline),
            output: None,
            details: ToolDetails::Shown,
        });
        let text = blocks[1]["text"]["text"].as_str().unwrap();
        assert!(text.chars().count() <= MAX_TEXT_CHARS);
        assert!(text.starts_with("*Input*: `ls"));
        assert!(text.ends_with("…`"));
    }

    #[test]
    fn block_count_is_capped() {
        let units = (0..80).map(|i| RenderedUnit::text(format!("u{i}"))).collect();
        assert_eq!(slack_blocks(&Batch::new("s", units)).len(), MAX_BLOCKS);
    }

    #[test]
    fn debug_redacts_token() {
        let sink = SlackSink::new(target("http://localhost", "C1")).unwrap();
        let debug = format!("{:?}", sink.target());
        assert!(!debug.contains("xoxb-test"));
    }

    #[tokio::test]
    async fn posts_blocks_to_thread() {
        let (api_url, captured) = spawn_stub().await;
        let sink = SlackSink::new(target(&api_url, "C123")).unwrap();
        let batch = Batch::new(
            "s1",
            vec![
                RenderedUnit::text("Hello"),
                RenderedUnit::ToolExecuted {
                    name: "bash".into(),
                    input: None,
                    output: None,
                    details: ToolDetails::Hidden,
                },
            ],
        );

        sink.emit(&batch).await.unwrap();

        let requests = captured.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (auth, body) = &requests[0];
        assert_eq!(auth.as_deref(), Some("Bearer xoxb-test"));
        assert_eq!(body["channel"], "C123");
        assert_eq!(body["thread_ts"], "1700000000.000100");
        assert_eq!(body["text"], "Hello\n\nTool executed: bash");
        assert_eq!(body["blocks"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn api_rejection_is_sink_error() {
        let (api_url, _captured) = spawn_stub().await;
        let sink = SlackSink::new(target(&api_url, "C-missing")).unwrap();
        let err = sink
            .emit(&Batch::new("s1", vec![RenderedUnit::text("Hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Api { ref code, .. } if code == "channel_not_found"));
    }

    #[tokio::test]
    async fn http_error_is_delivery_failure() {
        let (api_url, _captured) = spawn_stub().await;
        let sink = SlackSink::new(target(&format!("{api_url}/nowhere"), "C123")).unwrap();
        let err = sink
            .emit(&Batch::new("s1", vec![RenderedUnit::text("Hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::DeliveryFailed { ref reason, .. } if reason.contains("404")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_delivery_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let sink = SlackSink::new(target(&format!("http://{addr}/api"), "C123")).unwrap();
        let err = sink
            .emit(&Batch::new("s1", vec![RenderedUnit::text("Hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::DeliveryFailed { .. }));
    }
}
