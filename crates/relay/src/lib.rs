//! # turnpost Relay
//!
//! The streaming pipeline behind turnpost:
//!
//! ```text
//! bytes ─► framer ─► record decoder ─► classifier ─► correlator ─► renderer ─► Sink
//! ```
//!
//! - [`framer`]: newline framing over arbitrary chunking
//! - [`classifier`]: content items to turn events
//! - [`correlator`]: pending tool invocations keyed by id
//! - [`render`]: turn events to [`RenderedUnit`](turnpost_core::RenderedUnit)s
//! - [`session`]: per-run state tying the three together
//! - [`relay`]: the sequential read/process/emit loop
//! - [`tail`]: following a growing file instead of stdin

pub mod classifier;
pub mod correlator;
pub mod framer;
pub mod relay;
pub mod render;
pub mod session;
pub mod tail;

pub use correlator::{PendingToolInvocation, ToolCorrelator};
pub use framer::{Frame, FrameReader, LineFramer};
pub use relay::{Relay, RelayStats};
pub use render::{RenderOptions, format_tool_input};
pub use session::TurnSession;
pub use tail::{ChangeWatcher, FileTail, follow_file};
