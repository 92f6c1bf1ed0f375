//! # Tidesync Protocol
//!
//! Wire types for the tidesync pull/push protocol.
//!
//! This crate provides:
//! - [`SyncCursor`]: the opaque watermark marking how much of the server's
//!   change history a client has consumed
//! - [`ChangeSet`] / [`ChangeBatch`]: per-collection created/updated/deleted
//!   record groupings exchanged in both directions
//! - Pull and push request/response messages with their JSON wire shape
//!
//! ## Protocol
//!
//! One sync round is a pull followed by a push:
//! 1. `PullRequest { last_pulled_at }` → `PullResponse { changes, timestamp }`
//! 2. `PushRequest { changes, last_pulled_at: <timestamp from step 1> }`
//!
//! The cursor threaded through the push is always the cursor returned by the
//! same round's pull. Records are opaque JSON documents; the only field this
//! crate ever reads is `id`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changes;
mod cursor;
mod messages;

pub use changes::{ChangeBatch, ChangeSet, ChangeSetError, Record, RecordId};
pub use cursor::SyncCursor;
pub use messages::{PullRequest, PullResponse, PushRequest, PushResponse};
