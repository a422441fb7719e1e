//! Weft platform: the consensus pipeline assembled into a runnable node core.
//!
//! The platform owns one wiring model and connects every stage to it:
//! event creation, gossip, intake, consensus, tipset tracking and the
//! consensus output. The application and network layers plug in through
//! the [`Gossip`], [`ConsensusSink`], [`StatusProvider`] and [`Clock`]
//! traits.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod platform;

pub use config::{LoggingConfig, PlatformConfig, StageCapacities, WiringSection};
pub use error::PlatformError;
pub use logging::{init_logging, init_logging_from, LogFormat};
pub use metrics::PlatformMetrics;
pub use platform::{CreationTrigger, Platform};

pub use weft_types::{Clock, ConsensusSink, Gossip, StatusProvider};
