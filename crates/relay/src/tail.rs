//! File tail input: follow a transcript file as it grows.
//!
//! [`FileTail`] remembers how far into the file it has read and, on each
//! pass, reads only what was appended since. A line still being written at
//! the end of a pass is held until a later pass completes it. [`follow_file`]
//! runs one pass up front and another for every change notification from a
//! [`ChangeWatcher`], until the shutdown future resolves.

use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use turnpost_core::error::Result;
use turnpost_core::sink::Sink;

use crate::framer::{Frame, LineFramer};
use crate::relay::{Relay, RelayStats};

const CHUNK_SIZE: usize = 8 * 1024;

/// Resumable reader over a growing file.
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    offset: u64,
    framer: LineFramer,
}

impl FileTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            framer: LineFramer::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes of an unterminated line carried into the next pass.
    pub fn partial_len(&self) -> usize {
        self.framer.buffered()
    }

    /// Read everything appended since the last pass and return the complete
    /// lines. If the file shrank, it was truncated or replaced: start over
    /// from the beginning.
    pub async fn read_pass(&mut self) -> std::io::Result<Vec<Frame>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        if len < self.offset {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                len,
                "File shrank below the read offset; restarting from the beginning"
            );
            self.offset = 0;
            self.framer.reset();
        }

        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut chunk = vec![0; CHUNK_SIZE];
        let mut frames = Vec::new();
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            self.offset += n as u64;
            frames.extend(self.framer.push(&chunk[..n]));
        }

        debug!(offset = self.offset, frames = frames.len(), "Read pass finished");
        Ok(frames)
    }
}

/// Change notifications for one file, bridged from `notify`'s callback
/// thread into the async relay task.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher").finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    /// Start watching `path`. The file must exist.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(std::io::Error::other)?;

        info!(path = %path.display(), "Watching for file changes");
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next content change. Queued notifications are coalesced
    /// into one. Returns `None` once the watcher has shut down.
    pub async fn changed(&mut self) -> Option<()> {
        loop {
            let event = self.rx.recv().await?;
            if is_content_change(event) {
                while self.rx.try_recv().is_ok() {}
                return Some(());
            }
        }
    }
}

fn is_content_change(event: notify::Result<Event>) -> bool {
    match event {
        Ok(event) => match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => true,
            EventKind::Remove(_) => {
                warn!(paths = ?event.paths, "Watched file was removed");
                false
            }
            _ => false,
        },
        Err(e) => {
            warn!(error = %e, "File watcher error");
            false
        }
    }
}

/// Relay a growing file until `shutdown` resolves or the watcher stops.
///
/// Tool correlation state lives in `relay` and carries over between
/// passes. An unterminated line left over at shutdown is discarded.
pub async fn follow_file<S, F>(relay: &mut Relay<S>, path: &Path, shutdown: F) -> Result<RelayStats>
where
    S: Sink,
    F: Future<Output = ()>,
{
    let mut tail = FileTail::new(path);
    // Watch before the first pass so no append slips between the two.
    let mut watcher = ChangeWatcher::new(path)?;

    relay_pass(relay, &mut tail).await?;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested; stopping file tail");
                break;
            }
            changed = watcher.changed() => match changed {
                Some(()) => relay_pass(relay, &mut tail).await?,
                None => break,
            },
        }
    }

    if tail.partial_len() > 0 {
        warn!(bytes = tail.partial_len(), "Discarding unterminated trailing line");
    }
    Ok(relay.stats())
}

async fn relay_pass<S: Sink>(relay: &mut Relay<S>, tail: &mut FileTail) -> Result<()> {
    for frame in tail.read_pass().await? {
        relay.handle_frame(&frame).await?;
    }
    Ok(())
}
