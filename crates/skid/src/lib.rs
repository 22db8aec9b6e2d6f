//! Source-known identifiers.
//!
//! A [`SourceKnownId`] is a 64-bit signed integer that packs a whole-second
//! timestamp, the issuing application and application instance, and a
//! per-second sequence. IDs from one process are time ordered and can be
//! compared directly (e.g. as keyset pagination cursors).
//!
//! A [`SourceKnownEntityId`] wraps a [`SourceKnownId`] and an entity-type tag
//! in a UUID-shaped 128-bit value guarded by a truncated keyed BLAKE3 hash, so
//! it can be handed out as an opaque token and validated when it comes back.
//!
//! Timestamps come from a [`HybridClock`] (monotonic ticks re-anchored against
//! the wall clock) sampled by a [`TimestampCache`]. Both are maintained by
//! [`PeriodicScheduler`] tasks on the current tokio runtime.
mod bits;
mod config;
mod entity;
mod error;
mod id;
mod runtime;
mod scheduler;
mod sequence;
mod status;
mod time;

pub use crate::bits::*;
pub use crate::config::*;
pub use crate::entity::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::runtime::*;
pub use crate::scheduler::*;
pub use crate::sequence::*;
pub use crate::status::*;
pub use crate::time::*;
