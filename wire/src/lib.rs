//! Wire: the bounded task-graph scheduler every pipeline stage runs on.
//!
//! A [`WiringModel`] owns a small pool of worker threads shared by all wires.
//! Each wire is a named, bounded queue bound to one handler:
//!
//! - **Sequential** wires run one task at a time in submission order, so the
//!   handler may own mutable state without further locking.
//! - **Concurrent** wires run tasks in parallel with no ordering guarantee.
//!
//! Submitting to a full wire blocks the caller; that is the only backpressure
//! mechanism and no task is ever silently dropped. A squelched wire accepts
//! and discards tasks without invoking its handler. A background
//! [`HealthMonitor`] flags the model unhealthy when any wire stays above its
//! occupancy threshold for too long.
//!
//! ## Module overview
//!
//! - [`config`]: worker pool and health monitor parameters.
//! - [`wire`]: the per-wire queue, scheduling and [`WireHandle`].
//! - [`model`]: the [`WiringModel`] that creates wires and owns the pool.
//! - [`health`]: backlog sampling and the healthy/unhealthy flag.
//! - [`error`]: wire error types.

pub mod config;
pub mod error;
pub mod health;
pub mod model;
pub mod wire;

pub use config::{HealthConfig, WiringConfig, DEFAULT_WIRE_CAPACITY};
pub use error::WireError;
pub use health::{HealthMonitor, HealthReport, WireSnapshot};
pub use model::WiringModel;
pub use wire::{ConcurrencyMode, HandlerResult, WireHandle, WireStats};
