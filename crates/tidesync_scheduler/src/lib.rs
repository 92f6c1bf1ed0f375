//! # Tidesync Scheduler
//!
//! The background sync scheduler decides *when* a sync round runs. It
//! multiplexes several trigger sources (app lifecycle, network
//! reachability, a debounced local-change signal, a periodic timer, and
//! manual requests) into a single, mutually-exclusive execution slot, and
//! drains the offline action queue when connectivity returns.
//!
//! This crate provides:
//! - [`SyncScheduler`]: an explicitly constructed service instance owning
//!   its own state, timers and subscriptions
//! - [`SchedulerConfig`] / [`RetryConfig`]: trigger policy knobs
//! - [`SourceEvent`]: the channel-based event source interface
//! - [`SyncRunner`]: the seam to the sync protocol client
//!
//! ## Key invariants
//!
//! - At most one sync round is active at any time; triggers arriving while
//!   a round is in flight are silently dropped, not queued
//! - A debounced change trigger never runs before its quiet window elapses;
//!   a later change unconditionally restarts the window
//! - On reachability, the sync round and the queue drain run sequentially,
//!   never interleaved

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod events;
mod runner;
mod scheduler;
mod state;

pub use config::{RetryConfig, SchedulerConfig};
pub use events::{event_channel, EventSender, SourceEvent};
pub use runner::SyncRunner;
pub use scheduler::SyncScheduler;
pub use state::{SyncState, Trigger};
