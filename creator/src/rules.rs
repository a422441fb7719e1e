//! Event creation rules.
//!
//! Each rule is a pure predicate over a [`CreationContext`] snapshot. Rules
//! are checked in order; the first one that forbids creation becomes the
//! reported [`EventCreationStatus`]. The only state kept between
//! evaluations is the time of the last created event, for rate limiting
//! and heartbeats.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_types::{PlatformStatus, Timestamp};

/// Why the creator is (or is not) creating events right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCreationStatus {
    /// Every rule permits creation.
    Attempting,
    /// No other-parent would advance this node's view of the DAG.
    NoEligibleParents,
    /// The last event was created too recently.
    RateLimited,
    /// The scheduler reports an unhealthy pipeline.
    PipelineBackpressure,
    /// The platform status does not allow creation.
    PlatformStatus,
    /// This node's own backlog is too large.
    Overloaded,
    /// Nothing to send and the heartbeat interval has not elapsed.
    Idle,
}

impl EventCreationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attempting => "attempting",
            Self::NoEligibleParents => "no_eligible_parents",
            Self::RateLimited => "rate_limited",
            Self::PipelineBackpressure => "pipeline_backpressure",
            Self::PlatformStatus => "platform_status",
            Self::Overloaded => "overloaded",
            Self::Idle => "idle",
        }
    }

    /// Stable numeric code, for gauges.
    pub fn code(&self) -> i64 {
        match self {
            Self::Attempting => 0,
            Self::NoEligibleParents => 1,
            Self::RateLimited => 2,
            Self::PipelineBackpressure => 3,
            Self::PlatformStatus => 4,
            Self::Overloaded => 5,
            Self::Idle => 6,
        }
    }
}

impl fmt::Display for EventCreationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally supplied state the rules are evaluated against.
#[derive(Clone, Debug)]
pub struct CreationContext {
    pub now: Timestamp,
    pub platform_status: PlatformStatus,
    /// Scheduler health as reported by the wiring model.
    pub healthy: bool,
    /// Tasks waiting in this node's pipeline.
    pub backlog: usize,
    pub has_eligible_parent: bool,
    /// Whether the next event would be this creator's first.
    pub first_event: bool,
    pub pending_transactions: usize,
    pub last_created: Option<Timestamp>,
}

/// A single creation rule.
#[derive(Clone, Debug, PartialEq)]
pub enum CreationRule {
    PlatformStatus,
    PipelineHealth,
    Overload { max_backlog: usize },
    RateLimit { min_period: Duration },
    ParentAvailability,
    Heartbeat { interval: Duration },
}

impl CreationRule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlatformStatus => "platform_status",
            Self::PipelineHealth => "pipeline_health",
            Self::Overload { .. } => "overload",
            Self::RateLimit { .. } => "rate_limit",
            Self::ParentAvailability => "parent_availability",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// The status this rule reports when it forbids creation, `None` when it permits.
    pub fn check(&self, ctx: &CreationContext) -> Option<EventCreationStatus> {
        let forbidden = match self {
            Self::PlatformStatus => !ctx.platform_status.permits_event_creation(),
            Self::PipelineHealth => !ctx.healthy,
            Self::Overload { max_backlog } => ctx.backlog > *max_backlog,
            Self::RateLimit { min_period } => {
                matches!(ctx.last_created, Some(last) if last.elapsed_since(ctx.now) < *min_period)
            }
            Self::ParentAvailability => !ctx.has_eligible_parent && !ctx.first_event,
            Self::Heartbeat { interval } => {
                ctx.pending_transactions == 0
                    && matches!(ctx.last_created, Some(last) if last.elapsed_since(ctx.now) < *interval)
            }
        };
        forbidden.then(|| self.forbidden_status())
    }

    fn forbidden_status(&self) -> EventCreationStatus {
        match self {
            Self::PlatformStatus => EventCreationStatus::PlatformStatus,
            Self::PipelineHealth => EventCreationStatus::PipelineBackpressure,
            Self::Overload { .. } => EventCreationStatus::Overloaded,
            Self::RateLimit { .. } => EventCreationStatus::RateLimited,
            Self::ParentAvailability => EventCreationStatus::NoEligibleParents,
            Self::Heartbeat { .. } => EventCreationStatus::Idle,
        }
    }
}

/// An ordered list of rules plus the rate limiter's memory.
#[derive(Clone, Debug)]
pub struct EventCreationRules {
    rules: Vec<CreationRule>,
    last_created: Option<Timestamp>,
    status: EventCreationStatus,
}

impl EventCreationRules {
    pub fn new(rules: Vec<CreationRule>) -> Self {
        Self {
            rules,
            last_created: None,
            status: EventCreationStatus::Idle,
        }
    }

    pub fn rules(&self) -> &[CreationRule] {
        &self.rules
    }

    /// Evaluate the rules in order. The context's `last_created` is
    /// combined with the time recorded by [`Self::event_was_created`].
    pub fn evaluate(&mut self, ctx: &CreationContext) -> EventCreationStatus {
        let ctx = CreationContext {
            last_created: ctx.last_created.max(self.last_created),
            ..ctx.clone()
        };
        self.status = self
            .rules
            .iter()
            .find_map(|rule| rule.check(&ctx))
            .unwrap_or(EventCreationStatus::Attempting);
        self.status
    }

    pub fn is_event_creation_permitted(&mut self, ctx: &CreationContext) -> bool {
        self.evaluate(ctx) == EventCreationStatus::Attempting
    }

    pub fn event_was_created(&mut self, now: Timestamp) {
        self.last_created = self.last_created.max(Some(now));
    }

    /// Status reported by the most recent evaluation.
    pub fn status(&self) -> EventCreationStatus {
        self.status
    }

    pub fn last_created(&self) -> Option<Timestamp> {
        self.last_created
    }
}
