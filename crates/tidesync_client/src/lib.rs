//! # Tidesync Client
//!
//! The sync protocol client: executes one pull-then-push round against a
//! remote service using a monotonic cursor.
//!
//! This crate provides:
//! - [`SyncClient`]: the round logic with graceful pull degradation
//! - [`SyncTransport`]: the network seam, with [`HttpTransport`] and
//!   [`MockTransport`] implementations
//! - [`ChangeLog`]: the local-store seam, with [`MemoryChangeLog`] for tests
//!
//! ## Key invariants
//!
//! - Pull always precedes push within a round
//! - The cursor pushed in a round is exactly the cursor pulled in that round
//! - A failed pull never advances the watermark and never fails the round;
//!   it defers the server's changes to the next attempt
//! - A failed push propagates; local changes stay un-acknowledged and are
//!   retried on the next round

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_log;
mod client;
mod config;
mod error;
mod http;
mod transport;

pub use change_log::{ChangeLog, MemoryChangeLog};
pub use client::{SyncClient, SyncRound};
pub use config::ClientConfig;
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpResponse, HttpTransport};
pub use transport::{MockTransport, SyncTransport};
