//! # turnpost Core
//!
//! Domain types, traits, and error definitions for turnpost, a relay that
//! turns an assistant's stream-json transcript into readable posts.
//!
//! This crate defines the wire schema ([`record`]), the rendered output model
//! ([`turn`]), and the [`Sink`] trait that output destinations implement.
//! The framing, classification, and correlation pipeline lives in
//! `turnpost-relay`; concrete sinks live in `turnpost-channels`.

pub mod error;
pub mod record;
pub mod sink;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{DecodeError, Error, Result, SinkError};
pub use record::{
    AssistantPayload, ContentItem, DecodedRecord, Envelope, Record, UserPayload, decode_record,
};
pub use sink::Sink;
pub use turn::{Batch, RenderedUnit, ToolDetails};
