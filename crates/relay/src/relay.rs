//! The relay loop: frame, decode, classify, render, emit.
//!
//! Everything runs sequentially on one task: a frame is fully processed,
//! including the sink call, before the next one is read. Decode errors abort
//! the run; sink errors are logged and counted.

use tokio::io::AsyncRead;
use tracing::{debug, error, info};
use turnpost_core::error::{DecodeError, Result};
use turnpost_core::record::{Record, decode_record};
use turnpost_core::sink::Sink;
use turnpost_core::turn::Batch;

use crate::framer::FrameReader;
use crate::render::RenderOptions;
use crate::session::TurnSession;

/// Counters for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Non-blank lines read.
    pub frames: u64,
    /// Lines decoded into records, including ignored kinds.
    pub records: u64,
    /// Records of a kind the relay does not act on.
    pub ignored: u64,
    /// Batches handed to the sink.
    pub batches: u64,
    pub sink_failures: u64,
}

/// Drives records from an input source into a [`Sink`].
pub struct Relay<S> {
    session: TurnSession,
    sink: S,
    stats: RelayStats,
}

impl<S: Sink> Relay<S> {
    pub fn new(sink: S, options: RenderOptions) -> Self {
        Self {
            session: TurnSession::new(options),
            sink,
            stats: RelayStats::default(),
        }
    }

    /// Process one framed line.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> std::result::Result<(), DecodeError> {
        self.stats.frames += 1;
        let decoded = decode_record(frame)?;
        self.stats.records += 1;

        if let Record::Ignored { kind } = &decoded.record {
            self.stats.ignored += 1;
            debug!(kind = %kind, session_id = %decoded.session_id, "Ignoring record");
            return Ok(());
        }

        let units = self.session.process(&decoded.record);
        if units.is_empty() {
            return Ok(());
        }

        let batch = Batch::new(decoded.session_id, units);
        self.stats.batches += 1;
        match self.sink.emit(&batch).await {
            Ok(()) => debug!(
                sink = self.sink.name(),
                session_id = %batch.session_id,
                units = batch.units.len(),
                "Delivered batch"
            ),
            Err(e) => {
                self.stats.sink_failures += 1;
                error!(sink = self.sink.name(), session_id = %batch.session_id, error = %e, "Failed to deliver batch");
            }
        }
        Ok(())
    }

    /// Relay every record from `reader` until end of input.
    pub async fn run<R: AsyncRead + Unpin>(&mut self, reader: R) -> Result<RelayStats> {
        let mut frames = FrameReader::new(reader);
        while let Some(frame) = frames.next_frame().await? {
            self.handle_frame(&frame).await?;
        }
        info!(bytes = frames.bytes_read(), "Input stream ended");
        Ok(self.stats)
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn session(&self) -> &TurnSession {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
