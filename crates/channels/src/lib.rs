//! Output sinks for turnpost.
//!
//! - **Console**: framed plain text on stdout
//! - **Slack**: Block Kit messages posted into a thread

pub mod console;
pub mod slack;

pub use console::{ConsoleSink, console_lines};
pub use slack::{SlackSink, slack_blocks};
