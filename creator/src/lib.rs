//! Event creation for the local node.
//!
//! - [`rules`]: Ordered creation rules and the reported creation status.
//! - [`tipset`]: Per-event ancestry summaries used to pick other-parents.
//! - [`creator`]: [`EventCreator`], which builds, signs and routes events.
//! - [`config`]: Creation tunables.
//! - [`error`]: Creator error types.

pub mod config;
pub mod creator;
pub mod error;
pub mod rules;
pub mod tipset;

pub use config::CreationConfig;
pub use creator::{CreationInputs, EventCreator, EventRouting};
pub use error::CreatorError;
pub use rules::{CreationContext, CreationRule, EventCreationRules, EventCreationStatus};
pub use tipset::{Tipset, TipsetTracker};
