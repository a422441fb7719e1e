//! The platform: every pipeline stage wired onto one scheduler.
//!
//! ```text
//! heartbeat ─▶ event_creation ─┬─▶ gossip ─▶ Gossip
//!                              └─▶ intake ◀─ on_event_received
//!                                    ├─▶ consensus ─▶ consensus_output ─▶ ConsensusSink
//!                                    └─▶ tipset
//! ```
//!
//! Consensus publishes the ancient threshold through a shared atomic that
//! intake and the tipset tracker read before handling each event, so no
//! wire feeds back into an earlier stage.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use weft_consensus::{ConsensusEngine, ConsensusError, FatalError};
use weft_creator::{
    CreationInputs, EventCreationStatus, EventCreator, EventRouting, TipsetTracker,
};
use weft_crypto::{EventSigner, SignatureVerifier};
use weft_intake::{EventValidator, OrphanBuffer};
use weft_txpool::TransactionPool;
use weft_types::{
    Clock, ConsensusRound, ConsensusSink, Event, Gossip, Roster, StatusProvider, Transaction,
};
use weft_wire::{ConcurrencyMode, HealthReport, WireError, WireHandle, WiringModel};

use crate::config::PlatformConfig;
use crate::metrics::PlatformMetrics;
use crate::PlatformError;

/// Creation, intake and consensus block while their downstream wire is full,
/// so one more worker than that keeps the last stage draining.
const MIN_WORKER_THREADS: usize = 4;

/// Why the creator was asked to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationTrigger {
    Heartbeat,
    Manual,
}

/// Wires squelched when consensus halts.
struct HaltWires {
    creation: WireHandle<CreationTrigger>,
    intake: WireHandle<Arc<Event>>,
    consensus: WireHandle<Arc<Event>>,
}

/// State shared between handlers and the platform handle.
struct Shared {
    ancient_threshold: AtomicU64,
    last_decided_round: AtomicU64,
    halted: AtomicBool,
    creation_status: Mutex<EventCreationStatus>,
    halt_wires: OnceLock<HaltWires>,
    fatal_tx: Sender<FatalError>,
}

impl Shared {
    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    fn halt(&self, fatal: FatalError) {
        if self.halted.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(wires) = self.halt_wires.get() {
            wires.creation.squelch();
            wires.intake.squelch();
            wires.consensus.squelch();
        }
        let _ = self.fatal_tx.send(fatal);
    }
}

struct Heartbeat {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Platform {
    config: PlatformConfig,
    roster: Arc<Roster>,
    model: WiringModel,
    creation: WireHandle<CreationTrigger>,
    intake: WireHandle<Arc<Event>>,
    pool: Arc<TransactionPool>,
    tipsets: Arc<Mutex<TipsetTracker>>,
    shared: Arc<Shared>,
    metrics: Arc<PlatformMetrics>,
    fatal_rx: Receiver<FatalError>,
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl Platform {
    /// Build every stage and connect the wires. Nothing runs on its own
    /// until [`Platform::start`] is called.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        config: PlatformConfig,
        roster: Arc<Roster>,
        signer: Arc<dyn EventSigner>,
        verifier: Arc<dyn SignatureVerifier>,
        gossip: Arc<dyn Gossip>,
        sink: Arc<dyn ConsensusSink>,
        status: Arc<dyn StatusProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlatformError> {
        let mut wiring_config = config.wiring.wiring_config();
        if wiring_config.worker_threads < MIN_WORKER_THREADS {
            warn!(
                configured = wiring_config.worker_threads,
                using = MIN_WORKER_THREADS,
                "too few worker threads for the pipeline, raising"
            );
            wiring_config.worker_threads = MIN_WORKER_THREADS;
        }
        let model = WiringModel::new(wiring_config, config.health.clone())?;
        let metrics = Arc::new(PlatformMetrics::new());
        let (fatal_tx, fatal_rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            ancient_threshold: AtomicU64::new(0),
            last_decided_round: AtomicU64::new(0),
            halted: AtomicBool::new(false),
            creation_status: Mutex::new(EventCreationStatus::Idle),
            halt_wires: OnceLock::new(),
            fatal_tx,
        });
        let pool = Arc::new(TransactionPool::new(config.txpool.clone()));
        let tipsets = Arc::new(Mutex::new(TipsetTracker::new(Arc::clone(&roster))));
        let wiring = &config.wiring;
        let capacities = &wiring.capacities;

        let output = {
            let metrics = Arc::clone(&metrics);
            model.create_sequential_wire(
                "consensus_output",
                wiring.capacity_of(capacities.consensus_output),
                move |round: ConsensusRound| {
                    sink.on_consensus_round(&round);
                    metrics.rounds_decided.inc();
                    metrics.consensus_events.inc_by(round.records.len() as u64);
                    metrics.stale_events.inc_by(round.stale.len() as u64);
                    metrics.round_size.observe(round.records.len() as f64);
                    metrics.last_decided_round.set(round.round as i64);
                    metrics.ancient_threshold.set(round.ancient_threshold as i64);
                    Ok(())
                },
            )?
        };

        let tipset = {
            let tipsets = Arc::clone(&tipsets);
            let shared = Arc::clone(&shared);
            model.create_sequential_wire(
                "tipset",
                wiring.capacity_of(capacities.tipset),
                move |event: Arc<Event>| {
                    let mut tracker = tipsets.lock();
                    tracker.set_ancient_threshold(shared.ancient_threshold.load(Ordering::Acquire));
                    tracker.observe(&event);
                    Ok(())
                },
            )?
        };

        let consensus = {
            let mut engine = ConsensusEngine::new(Arc::clone(&roster), config.consensus.clone());
            let shared = Arc::clone(&shared);
            model.create_sequential_wire(
                "consensus",
                wiring.capacity_of(capacities.consensus),
                move |event: Arc<Event>| match engine.add_event(event) {
                    Ok(rounds) => {
                        for round in rounds {
                            shared
                                .ancient_threshold
                                .fetch_max(round.ancient_threshold, Ordering::AcqRel);
                            shared
                                .last_decided_round
                                .fetch_max(round.round, Ordering::AcqRel);
                            output.submit(round)?;
                        }
                        Ok(())
                    }
                    Err(ConsensusError::Fatal(fatal)) => {
                        error!(
                            error = %fatal,
                            last_decided_round = engine.last_decided_round(),
                            max_round = engine.max_round(),
                            events = engine.event_count(),
                            "consensus failed, halting platform"
                        );
                        shared.halt(fatal);
                        Ok(())
                    }
                    Err(ConsensusError::Halted(_)) => Ok(()),
                },
            )?
        };

        let intake = {
            let mut buffer = OrphanBuffer::new(
                config.intake.clone(),
                EventValidator::new(Arc::clone(&roster), verifier),
            );
            let consensus = consensus.clone();
            let shared = Arc::clone(&shared);
            let metrics = Arc::clone(&metrics);
            model.create_sequential_wire(
                "intake",
                wiring.capacity_of(capacities.intake),
                move |event: Arc<Event>| {
                    let threshold = shared.ancient_threshold.load(Ordering::Acquire);
                    if threshold > buffer.ancient_threshold() {
                        let update = buffer.set_ancient_threshold(threshold);
                        forward(&update.released, &consensus, &tipset)?;
                        metrics.events_admitted.inc_by(update.released.len() as u64);
                    }
                    match buffer.submit(event) {
                        Ok(outcome) => {
                            forward(outcome.admitted(), &consensus, &tipset)?;
                            metrics.events_admitted.inc_by(outcome.admitted().len() as u64);
                        }
                        Err(_) => metrics.events_rejected.inc(),
                    }
                    metrics.orphan_count.set(buffer.orphan_count() as i64);
                    Ok(())
                },
            )?
        };

        let gossip_wire = model.create_wire(
            "gossip",
            ConcurrencyMode::Concurrent,
            wiring.capacity_of(capacities.gossip),
            move |event: Arc<Event>| {
                gossip.broadcast_event(&event);
                Ok(())
            },
        )?;

        let creation = {
            let creator = EventCreator::new(
                signer,
                config.creation.clone(),
                Arc::clone(&tipsets),
                Arc::clone(&pool),
            );
            creator.validate(&roster)?;
            let mut creator = creator.with_routing(EventRouting {
                gossip: gossip_wire,
                intake: intake.clone(),
            });
            let monitor = Arc::clone(model.health_monitor());
            let intake = intake.clone();
            let consensus = consensus.clone();
            let shared = Arc::clone(&shared);
            let metrics = Arc::clone(&metrics);
            model.create_sequential_wire(
                "event_creation",
                capacities.event_creation,
                move |trigger: CreationTrigger| {
                    if shared.is_halted() {
                        return Ok(());
                    }
                    let inputs = CreationInputs {
                        now: clock.now(),
                        platform_status: status.platform_status(),
                        healthy: monitor.is_healthy(),
                        backlog: intake.backlog() + consensus.backlog(),
                    };
                    let created = creator.maybe_create_event(inputs)?;
                    let creation_status = creator.status();
                    *shared.creation_status.lock() = creation_status;
                    metrics.creation_status.set(creation_status.code());
                    match created {
                        Some(_) => metrics.events_created.inc(),
                        None if trigger == CreationTrigger::Manual => {
                            debug!(status = %creation_status, "requested event not created");
                        }
                        None => {}
                    }
                    Ok(())
                },
            )?
        };

        let _ = shared.halt_wires.set(HaltWires {
            creation: creation.clone(),
            intake: intake.clone(),
            consensus,
        });

        info!(
            members = roster.len(),
            wires = model.wire_names().len(),
            "platform built"
        );
        Ok(Self {
            config,
            roster,
            model,
            creation,
            intake,
            pool,
            tipsets,
            shared,
            metrics,
            fatal_rx,
            heartbeat: Mutex::new(None),
        })
    }

    /// Start the health monitor and the heartbeat that drives event creation.
    pub fn start(&self) -> Result<(), PlatformError> {
        let mut heartbeat = self.heartbeat.lock();
        if heartbeat.is_some() {
            return Ok(());
        }
        if self.model.is_shut_down() {
            return Err(WireError::Shutdown {
                wire: "event_creation".to_string(),
            }
            .into());
        }
        self.model.start_health_monitor()?;

        let period = self.config.creation.creation_period();
        let ticker = channel::tick(period);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let creation = self.creation.clone();
        let monitor = Arc::clone(self.model.health_monitor());
        let metrics = Arc::clone(&self.metrics);

        let handle = thread::Builder::new()
            .name("weft-heartbeat".into())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(ticker) -> _ => {
                        metrics.observe_health(&monitor.report(Instant::now()));
                        if creation.offer(CreationTrigger::Heartbeat).is_err() {
                            break;
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })?;

        info!(creation_period_ms = period.as_millis() as u64, "platform started");
        *heartbeat = Some(Heartbeat {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    /// Ask the creator to try right away. Returns once the request is queued.
    pub fn create_event_now(&self) -> Result<(), PlatformError> {
        if self.shared.is_halted() {
            return Err(PlatformError::Halted);
        }
        self.creation.submit(CreationTrigger::Manual)?;
        Ok(())
    }

    /// Offer an application transaction for inclusion in a future event.
    pub fn submit_transaction(&self, transaction: Transaction) -> bool {
        let accepted = !self.shared.is_halted() && self.pool.submit(transaction);
        if accepted {
            self.metrics.transactions_submitted.inc();
        } else {
            self.metrics.transactions_rejected.inc();
        }
        accepted
    }

    /// Inbound gossip: hand a peer's event to intake. Blocks while intake is full.
    pub fn on_event_received(&self, event: Arc<Event>) -> Result<(), PlatformError> {
        if self.shared.is_halted() {
            return Err(PlatformError::Halted);
        }
        self.intake.submit(event)?;
        Ok(())
    }

    pub fn creation_status(&self) -> EventCreationStatus {
        *self.shared.creation_status.lock()
    }

    pub fn is_healthy(&self) -> bool {
        !self.shared.is_halted() && self.model.is_healthy()
    }

    pub fn is_halted(&self) -> bool {
        self.shared.is_halted()
    }

    /// Fatal consensus errors; at most one is ever sent.
    pub fn fatal_errors(&self) -> Receiver<FatalError> {
        self.fatal_rx.clone()
    }

    pub fn ancient_threshold(&self) -> u64 {
        self.shared.ancient_threshold.load(Ordering::Acquire)
    }

    pub fn last_decided_round(&self) -> u64 {
        self.shared.last_decided_round.load(Ordering::Acquire)
    }

    pub fn health_report(&self) -> HealthReport {
        self.model.health_report()
    }

    pub fn metrics(&self) -> &Arc<PlatformMetrics> {
        &self.metrics
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn pending_transactions(&self) -> usize {
        self.pool.len()
    }

    /// Number of events the local tipset tracker currently remembers.
    pub fn tracked_events(&self) -> usize {
        self.tipsets.lock().len()
    }

    /// Block until every stage is idle.
    pub fn flush(&self) {
        self.model.flush();
    }

    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        self.model.flush_timeout(timeout)
    }

    /// Stop the heartbeat, then the scheduler. Idempotent.
    pub fn shutdown(&self) {
        self.stop_heartbeat();
        if !self.model.is_shut_down() {
            self.model.shutdown();
            info!("platform shut down");
        }
    }

    fn stop_heartbeat(&self) {
        if let Some(heartbeat) = self.heartbeat.lock().take() {
            let _ = heartbeat.stop.send(());
            let _ = heartbeat.handle.join();
        }
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn forward(
    events: &[Arc<Event>],
    consensus: &WireHandle<Arc<Event>>,
    tipset: &WireHandle<Arc<Event>>,
) -> Result<(), WireError> {
    for event in events {
        consensus.submit(Arc::clone(event))?;
        tipset.submit(Arc::clone(event))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_crypto::Ed25519Verifier;
    use weft_nullables::{DagGenerator, NullClock, RecordingGossip, RecordingSink, StaticStatus};
    use weft_types::{EventHash, PlatformStatus};

    fn test_config() -> PlatformConfig {
        let mut config = PlatformConfig::default();
        config.wiring.worker_threads = 4;
        config.creation.max_creation_rate = 0.0;
        config.creation.heartbeat_interval_ms = 0;
        config
    }

    fn platform() -> (Platform, Arc<RecordingGossip>, Arc<StaticStatus>) {
        let gossip = Arc::new(RecordingGossip::new());
        let status = Arc::new(StaticStatus::default());
        let platform = Platform::build(
            test_config(),
            DagGenerator::round_robin(4).roster(),
            Arc::new(DagGenerator::signer(0)),
            Arc::new(Ed25519Verifier),
            gossip.clone(),
            Arc::new(RecordingSink::new()),
            status.clone(),
            Arc::new(NullClock::default()),
        )
        .unwrap();
        (platform, gossip, status)
    }

    #[test]
    fn manual_creation_reaches_gossip_and_intake() {
        let (platform, gossip, _) = platform();
        platform.create_event_now().unwrap();
        platform.flush();

        assert_eq!(gossip.len(), 1);
        assert_eq!(platform.creation_status(), EventCreationStatus::Attempting);
        assert_eq!(platform.metrics().events_created.get(), 1);
        assert_eq!(platform.metrics().events_admitted.get(), 1);
        assert_eq!(platform.tracked_events(), 1);
    }

    #[test]
    fn status_blocks_creation() {
        let (platform, gossip, status) = platform();
        status.set(PlatformStatus::Observing);
        platform.create_event_now().unwrap();
        platform.flush();

        assert!(gossip.is_empty());
        assert_eq!(platform.creation_status(), EventCreationStatus::PlatformStatus);
    }

    #[test]
    fn halting_squelches_and_reports_once() {
        let (platform, gossip, _) = platform();
        let fatal = platform.fatal_errors();
        let error = FatalError::ConflictingEvent {
            hash: EventHash::new([9; 32]),
        };
        platform.shared.halt(error.clone());
        platform.shared.halt(error.clone());

        assert!(platform.is_halted());
        assert!(!platform.is_healthy());
        assert_eq!(fatal.try_recv(), Ok(error));
        assert!(fatal.try_recv().is_err());
        assert!(matches!(platform.create_event_now(), Err(PlatformError::Halted)));
        assert!(!platform.submit_transaction(Transaction::new(vec![1])));

        // Anything already queued is discarded.
        platform.creation.submit(CreationTrigger::Manual).unwrap();
        platform.flush();
        assert!(gossip.is_empty());
    }

    #[test]
    fn signer_outside_roster_fails_build() {
        let result = Platform::build(
            test_config(),
            DagGenerator::round_robin(2).roster(),
            Arc::new(DagGenerator::signer(3)),
            Arc::new(Ed25519Verifier),
            Arc::new(RecordingGossip::new()),
            Arc::new(RecordingSink::new()),
            Arc::new(StaticStatus::default()),
            Arc::new(NullClock::default()),
        );
        assert!(matches!(result, Err(PlatformError::Creator(_))));
    }

    #[test]
    fn start_and_shutdown_are_idempotent() {
        let (platform, _, _) = platform();
        platform.start().unwrap();
        platform.start().unwrap();
        platform.shutdown();
        platform.shutdown();
        assert!(platform.create_event_now().is_err());
        assert!(platform.start().is_err());
    }
}
