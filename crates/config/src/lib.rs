//! Configuration loading, validation, and output-mode resolution for turnpost.
//!
//! Settings come from four layers, highest priority first:
//! command-line overrides, environment variables, `~/.turnpost/config.toml`,
//! and built-in defaults. Empty strings count as "not set" at every layer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Slack bot token.
pub const ENV_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
/// Slack channel the thread lives in.
pub const ENV_CHANNEL_ID: &str = "SLACK_CHANNEL_ID";
/// Timestamp of the thread's parent message.
pub const ENV_THREAD_TS: &str = "SLACK_THREAD_TS";
/// Slack Web API base URL.
pub const ENV_API_URL: &str = "SLACK_API_URL";
pub const ENV_SHOW_TOOL_INPUT: &str = "TURNPOST_SHOW_TOOL_INPUT";
pub const ENV_SHOW_TOOL_DETAILS: &str = "TURNPOST_SHOW_TOOL_DETAILS";

/// The root configuration structure.
///
/// Maps directly to `~/.turnpost/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Slack destination and credentials
    #[serde(default)]
    pub slack: SlackConfig,

    /// What tool information to show
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://slack.com/api".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            thread_ts: None,
            api_url: default_api_url(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("channel_id", &self.channel_id)
            .field("thread_ts", &self.thread_ts)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Show formatted tool input when a tool is invoked.
    #[serde(default)]
    pub show_tool_input: bool,

    /// Show input and output of completed tools. Unset means shown on the
    /// console and hidden in Slack, so the console does not follow the
    /// renderer's `ToolDetails::Hidden` default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_tool_details: Option<bool>,
}

/// Values supplied on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub thread_ts: Option<String>,
    pub api_url: Option<String>,
    pub show_tool_input: Option<bool>,
    pub show_tool_details: Option<bool>,
}

/// Where rendered turns go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Print to stdout. Used when no Slack credentials are configured.
    Console,
    Slack(SlackTarget),
}

/// A fully specified Slack destination.
#[derive(Clone, PartialEq, Eq)]
pub struct SlackTarget {
    pub bot_token: String,
    pub channel_id: String,
    pub thread_ts: String,
    pub api_url: String,
}

impl std::fmt::Debug for SlackTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackTarget")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("thread_ts", &self.thread_ts)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl RelayConfig {
    /// Load configuration from the default path (~/.turnpost/config.toml)
    /// with environment variable overrides applied.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment variable overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.normalize();
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| non_empty(lookup(key));

        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            self.slack.bot_token = Some(token);
        }
        if let Some(channel) = lookup(ENV_CHANNEL_ID) {
            self.slack.channel_id = Some(channel);
        }
        if let Some(thread) = lookup(ENV_THREAD_TS) {
            self.slack.thread_ts = Some(thread);
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.slack.api_url = url;
        }
        if let Some(value) = lookup(ENV_SHOW_TOOL_INPUT) {
            self.display.show_tool_input = parse_bool(ENV_SHOW_TOOL_INPUT, &value)?;
        }
        if let Some(value) = lookup(ENV_SHOW_TOOL_DETAILS) {
            self.display.show_tool_details = Some(parse_bool(ENV_SHOW_TOOL_DETAILS, &value)?);
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = non_empty(overrides.bot_token) {
            self.slack.bot_token = Some(token);
        }
        if let Some(channel) = non_empty(overrides.channel_id) {
            self.slack.channel_id = Some(channel);
        }
        if let Some(thread) = non_empty(overrides.thread_ts) {
            self.slack.thread_ts = Some(thread);
        }
        if let Some(url) = non_empty(overrides.api_url) {
            self.slack.api_url = url;
        }
        if let Some(show) = overrides.show_tool_input {
            self.display.show_tool_input = show;
        }
        if overrides.show_tool_details.is_some() {
            self.display.show_tool_details = overrides.show_tool_details;
        }
    }

    /// Decide where output goes.
    ///
    /// All three Slack settings select Slack. No token selects the console.
    /// A token without a channel and thread is a contradiction.
    pub fn output_mode(&self) -> Result<OutputMode, ConfigError> {
        let slack = &self.slack;
        match (&slack.bot_token, &slack.channel_id, &slack.thread_ts) {
            (Some(token), Some(channel), Some(thread)) => Ok(OutputMode::Slack(SlackTarget {
                bot_token: token.clone(),
                channel_id: channel.clone(),
                thread_ts: thread.clone(),
                api_url: slack.api_url.trim_end_matches('/').to_string(),
            })),
            (Some(_), channel, thread) => Err(ConfigError::IncompleteSlackTarget {
                missing: [
                    channel.is_none().then_some("channel id"),
                    thread.is_none().then_some("thread timestamp"),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" and "),
            }),
            (None, channel, thread) => {
                if channel.is_some() || thread.is_some() {
                    tracing::warn!("Slack channel or thread set without a bot token; printing to the console");
                }
                Ok(OutputMode::Console)
            }
        }
    }

    /// Whether completed tools show input and output in `mode`.
    pub fn show_tool_details(&self, mode: &OutputMode) -> bool {
        self.display
            .show_tool_details
            .unwrap_or(matches!(mode, OutputMode::Console))
    }

    /// Whether tool invocations are announced before their results in
    /// `mode`. The console always announces; Slack only when tool input is
    /// being shown.
    pub fn announce_tool_use(&self, mode: &OutputMode) -> bool {
        matches!(mode, OutputMode::Console) || self.display.show_tool_input
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".turnpost")
    }

    fn normalize(&mut self) {
        let slack = &mut self.slack;
        slack.bot_token = non_empty(slack.bot_token.take());
        slack.channel_id = non_empty(slack.channel_id.take());
        slack.thread_ts = non_empty(slack.thread_ts.take());
        if slack.api_url.trim().is_empty() {
            slack.api_url = default_api_url();
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::ValidationError(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Slack bot token is set without a complete target (missing {missing})")]
    IncompleteSlackTarget { missing: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn slack_config(token: Option<&str>, channel: Option<&str>, thread: Option<&str>) -> RelayConfig {
        RelayConfig {
            slack: SlackConfig {
                bot_token: token.map(Into::into),
                channel_id: channel.map(Into::into),
                thread_ts: thread.map(Into::into),
                ..SlackConfig::default()
            },
            ..RelayConfig::default()
        }
    }

    #[test]
    fn default_config_is_console() {
        let config = RelayConfig::default();
        assert_eq!(config.output_mode().unwrap(), OutputMode::Console);
        assert_eq!(config.slack.api_url, "https://slack.com/api");
        assert!(!config.display.show_tool_input);
    }

    #[test]
    fn all_three_select_slack() {
        let config = slack_config(Some("xoxb-1"), Some("C1"), Some("1700000000.000100"));
        match config.output_mode().unwrap() {
            OutputMode::Slack(target) => {
                assert_eq!(target.channel_id, "C1");
                assert_eq!(target.thread_ts, "1700000000.000100");
                assert_eq!(target.api_url, "https://slack.com/api");
            }
            other => panic!("expected slack, got {other:?}"),
        }
    }

    #[test]
    fn token_without_target_is_rejected() {
        let err = slack_config(Some("xoxb-1"), None, None).output_mode().unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteSlackTarget { .. }));
        assert!(err.to_string().contains("channel id and thread timestamp"));

        let err = slack_config(Some("xoxb-1"), Some("C1"), None).output_mode().unwrap_err();
        assert!(err.to_string().contains("thread timestamp"));
        assert!(!err.to_string().contains("channel id"));
    }

    #[test]
    fn target_without_token_falls_back_to_console() {
        let config = slack_config(None, Some("C1"), Some("123.456"));
        assert_eq!(config.output_mode().unwrap(), OutputMode::Console);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = slack_config(Some("file-token"), Some("C-file"), None);
        config
            .apply_env(env(&[
                (ENV_BOT_TOKEN, "env-token"),
                (ENV_THREAD_TS, "42.0"),
                (ENV_SHOW_TOOL_INPUT, "yes"),
                (ENV_CHANNEL_ID, ""),
            ]))
            .unwrap();
        assert_eq!(config.slack.bot_token.as_deref(), Some("env-token"));
        assert_eq!(config.slack.channel_id.as_deref(), Some("C-file"));
        assert_eq!(config.slack.thread_ts.as_deref(), Some("42.0"));
        assert!(config.display.show_tool_input);
    }

    #[test]
    fn invalid_boolean_env_is_rejected() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_env(env(&[(ENV_SHOW_TOOL_DETAILS, "sometimes")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn cli_overrides_env() {
        let mut config = RelayConfig::default();
        config
            .apply_env(env(&[(ENV_CHANNEL_ID, "C-env"), (ENV_SHOW_TOOL_DETAILS, "false")]))
            .unwrap();
        config.apply_overrides(ConfigOverrides {
            channel_id: Some("C-cli".into()),
            show_tool_details: Some(true),
            bot_token: Some(String::new()),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.slack.channel_id.as_deref(), Some("C-cli"));
        assert_eq!(config.display.show_tool_details, Some(true));
        assert!(config.slack.bot_token.is_none());
    }

    #[test]
    fn tool_detail_defaults_depend_on_mode() {
        let config = RelayConfig::default();
        let slack = slack_config(Some("t"), Some("c"), Some("ts"))
            .output_mode()
            .unwrap();
        assert!(config.show_tool_details(&OutputMode::Console));
        assert!(!config.show_tool_details(&slack));
        assert!(config.announce_tool_use(&OutputMode::Console));
        assert!(!config.announce_tool_use(&slack));

        let mut explicit = RelayConfig::default();
        explicit.display.show_tool_details = Some(false);
        explicit.display.show_tool_input = true;
        assert!(!explicit.show_tool_details(&OutputMode::Console));
        assert!(explicit.announce_tool_use(&slack));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = RelayConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.slack.bot_token.is_none());
    }

    #[test]
    fn config_file_is_parsed_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[slack]
bot_token = "xoxb-file"
channel_id = ""
thread_ts = "1.2"
api_url = "http://localhost:9999/api/"

[display]
show_tool_input = true
"#,
        )
        .unwrap();

        let config = RelayConfig::load_from(&path).unwrap();
        assert_eq!(config.slack.bot_token.as_deref(), Some("xoxb-file"));
        assert!(config.slack.channel_id.is_none());
        assert!(config.display.show_tool_input);
        assert!(config.display.show_tool_details.is_none());
    }

    #[test]
    fn malformed_config_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[slack\nbot_token = 1").unwrap();
        assert!(matches!(
            RelayConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let mut config = slack_config(Some("t"), Some("c"), Some("ts"));
        config.slack.api_url = "http://localhost:9999/api/".into();
        match config.output_mode().unwrap() {
            OutputMode::Slack(target) => assert_eq!(target.api_url, "http://localhost:9999/api"),
            other => panic!("expected slack, got {other:?}"),
        }
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = slack_config(Some("xoxb-secret"), Some("C1"), Some("1.0"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("xoxb-secret"));
        assert!(debug.contains("[REDACTED]"));

        let OutputMode::Slack(target) = config.output_mode().unwrap() else {
            panic!("expected slack");
        };
        assert!(!format!("{target:?}").contains("xoxb-secret"));
    }
}
