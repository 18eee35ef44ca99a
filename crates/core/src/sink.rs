//! Sink trait: the abstraction over output destinations.
//!
//! A sink receives each [`Batch`] the relay produces and presents it
//! somewhere: the local console or a chat thread. Failures are reported
//! back to the relay, which logs them and keeps going.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::turn::Batch;

/// The core Sink trait.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human-readable sink name (e.g., "console", "slack").
    fn name(&self) -> &str;

    /// Present one batch. Never called with an empty batch.
    async fn emit(&self, batch: &Batch) -> std::result::Result<(), SinkError>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn emit(&self, batch: &Batch) -> std::result::Result<(), SinkError> {
        (**self).emit(batch).await
    }
}
