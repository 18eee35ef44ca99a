//! turnpost CLI: the main entry point.
//!
//! Reads newline-delimited transcript records from stdin (or tails a file
//! with `--file`) and relays each turn to a Slack thread, or to the console
//! when no Slack credentials are configured.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use turnpost_channels::{ConsoleSink, SlackSink};
use turnpost_config::{ConfigOverrides, OutputMode, RelayConfig};
use turnpost_core::error::{Error, Result};
use turnpost_core::sink::Sink;
use turnpost_core::turn::ToolDetails;
use turnpost_relay::{Relay, RenderOptions, follow_file};

#[derive(Parser)]
#[command(
    name = "turnpost",
    about = "turnpost: relay agent transcripts to Slack or the console",
    version,
    author
)]
struct Cli {
    /// Slack bot token (xoxb-...)
    #[arg(long)]
    bot_token: Option<String>,

    /// Slack channel to post into
    #[arg(long)]
    channel_id: Option<String>,

    /// Timestamp of the thread to reply in
    #[arg(long)]
    thread_ts: Option<String>,

    /// Override the Slack Web API base URL
    #[arg(long)]
    slack_api_url: Option<String>,

    /// Announce tool uses together with their input
    #[arg(long)]
    show_tool_input: bool,

    /// Show input and output of completed tools
    #[arg(long)]
    show_tool_details: bool,

    /// Config file (default: ~/.turnpost/config.toml)
    #[arg(long, env = "TURNPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Follow a growing file instead of reading stdin
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bot_token: self.bot_token.clone(),
            channel_id: self.channel_id.clone(),
            thread_ts: self.thread_ts.clone(),
            api_url: self.slack_api_url.clone(),
            show_tool_input: self.show_tool_input.then_some(true),
            show_tool_details: self.show_tool_details.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries console output.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!(error = %e, "turnpost stopped");
        return Err(e.into());
    }
    Ok(())
}

fn config_error(e: turnpost_config::ConfigError) -> Error {
    Error::Config {
        message: e.to_string(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RelayConfig::load_with_env(path),
        None => RelayConfig::load(),
    }
    .map_err(config_error)?;
    config.apply_overrides(cli.overrides());

    let mode = config.output_mode().map_err(config_error)?;
    let options = RenderOptions {
        show_tool_input: config.display.show_tool_input,
        announce_tool_use: config.announce_tool_use(&mode),
        tool_details: if config.show_tool_details(&mode) {
            ToolDetails::Shown
        } else {
            ToolDetails::Hidden
        },
    };

    let sink: Box<dyn Sink> = match &mode {
        OutputMode::Console => Box::new(ConsoleSink::new()),
        OutputMode::Slack(target) => Box::new(SlackSink::new(target.clone())?),
    };
    info!(
        sink = sink.name(),
        show_tool_input = options.show_tool_input,
        tool_details = ?options.tool_details,
        "Relay starting"
    );

    let mut relay = Relay::new(sink, options);
    let stats = match &cli.file {
        Some(path) => {
            info!(path = %path.display(), "Following file");
            follow_file(&mut relay, path, shutdown_signal()).await?
        }
        None => relay.run(tokio::io::stdin()).await?,
    };

    info!(
        frames = stats.frames,
        records = stats.records,
        ignored = stats.ignored,
        batches = stats.batches,
        sink_failures = stats.sink_failures,
        pending_tools = relay.session().correlator().pending_count(),
        "Relay finished"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C; follow until the watcher stops");
        std::future::pending::<()>().await;
    }
    info!("Interrupted, stopping");
}
