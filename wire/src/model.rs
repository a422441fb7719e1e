//! The wiring model: worker pool, wire registry and health monitor.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{HealthConfig, WiringConfig};
use crate::error::WireError;
use crate::health::{HealthMonitor, HealthReport};
use crate::wire::{
    ConcurrencyMode, Handler, HandlerResult, Lifecycle, WireControl, WireHandle, WireInner,
};

/// How long `shutdown` waits for in-flight handlers to return.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct MonitorThread {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the worker pool shared by every wire it creates.
pub struct WiringModel {
    config: WiringConfig,
    pool: Arc<rayon::ThreadPool>,
    lifecycle: Arc<Lifecycle>,
    wires: Mutex<Vec<Arc<dyn WireControl>>>,
    monitor: Arc<HealthMonitor>,
    monitor_thread: Mutex<Option<MonitorThread>>,
}

impl WiringModel {
    pub fn new(config: WiringConfig, health: HealthConfig) -> Result<Self, WireError> {
        if config.worker_threads == 0 {
            return Err(WireError::Pool("worker_threads must be at least 1".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("weft-worker-{i}"))
            .build()
            .map_err(|e| WireError::Pool(e.to_string()))?;

        info!(
            worker_threads = config.worker_threads,
            default_capacity = config.default_capacity,
            "wiring model created"
        );

        Ok(Self {
            config,
            pool: Arc::new(pool),
            lifecycle: Arc::new(Lifecycle::new()),
            wires: Mutex::new(Vec::new()),
            monitor: Arc::new(HealthMonitor::new(health)),
            monitor_thread: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &WiringConfig {
        &self.config
    }

    pub fn default_capacity(&self) -> usize {
        self.config.default_capacity
    }

    /// Create a wire whose handler is shared across invocations. In
    /// [`ConcurrencyMode::Sequential`] the handler is still called one task at a time.
    pub fn create_wire<T, F>(
        &self,
        name: &str,
        mode: ConcurrencyMode,
        capacity: usize,
        handler: F,
    ) -> Result<WireHandle<T>, WireError>
    where
        T: Send + 'static,
        F: Fn(T) -> HandlerResult + Send + Sync + 'static,
    {
        let handler = match mode {
            ConcurrencyMode::Sequential => Handler::Sequential(Mutex::new(
                Box::new(handler) as Box<dyn FnMut(T) -> HandlerResult + Send>
            )),
            ConcurrencyMode::Concurrent => Handler::Concurrent(Box::new(handler)),
        };
        self.register(name, capacity, handler)
    }

    /// Create a sequential wire whose handler owns mutable state.
    pub fn create_sequential_wire<T, F>(
        &self,
        name: &str,
        capacity: usize,
        handler: F,
    ) -> Result<WireHandle<T>, WireError>
    where
        T: Send + 'static,
        F: FnMut(T) -> HandlerResult + Send + 'static,
    {
        let handler: Box<dyn FnMut(T) -> HandlerResult + Send> = Box::new(handler);
        self.register(name, capacity, Handler::Sequential(Mutex::new(handler)))
    }

    fn register<T: Send + 'static>(
        &self,
        name: &str,
        capacity: usize,
        handler: Handler<T>,
    ) -> Result<WireHandle<T>, WireError> {
        if self.lifecycle.is_shut_down() {
            return Err(WireError::Shutdown {
                wire: name.to_string(),
            });
        }
        if capacity == 0 {
            return Err(WireError::InvalidCapacity(name.to_string()));
        }

        let mut wires = self.wires.lock();
        if wires.iter().any(|w| w.stats().name() == name) {
            return Err(WireError::DuplicateWire(name.to_string()));
        }
        let inner = WireInner::new(
            name,
            capacity,
            handler,
            Arc::clone(&self.pool),
            Arc::clone(&self.lifecycle),
        );
        self.monitor.register(Arc::clone(inner.stats()));
        debug!(wire = name, mode = %inner.stats().mode(), capacity, "wire created");
        wires.push(inner.clone() as Arc<dyn WireControl>);
        Ok(WireHandle::new(inner))
    }

    pub fn wire_names(&self) -> Vec<String> {
        self.wires
            .lock()
            .iter()
            .map(|w| w.stats().name().to_string())
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.monitor.is_healthy()
    }

    pub fn health_report(&self) -> HealthReport {
        self.monitor.report(Instant::now())
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Spawn the background sampling thread. Calling it again is a no-op.
    pub fn start_health_monitor(&self) -> Result<(), WireError> {
        let mut slot = self.monitor_thread.lock();
        if slot.is_some() || self.lifecycle.is_shut_down() {
            return Ok(());
        }

        let period = self.monitor.config().sample_period();
        let ticker = channel::tick(period);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let monitor = Arc::clone(&self.monitor);

        let handle = thread::Builder::new()
            .name("weft-health".into())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(ticker) -> tick => {
                        if let Ok(now) = tick {
                            monitor.sample(now);
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })?;

        info!(sample_period_ms = period.as_millis() as u64, "health monitor started");
        *slot = Some(MonitorThread {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    /// Block until every wire is idle.
    pub fn flush(&self) {
        self.lifecycle.wait_idle(None);
    }

    /// Block until every wire is idle or `timeout` passes. Returns `true` if idle.
    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        self.lifecycle.wait_idle(Some(Instant::now() + timeout))
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.is_shut_down()
    }

    /// Stop accepting tasks, wake blocked submitters, stop the health monitor
    /// and wait for in-flight handlers. Queued tasks are discarded.
    pub fn shutdown(&self) {
        if !self.lifecycle.begin_shutdown() {
            return;
        }
        info!("wiring model shutting down");

        for wire in self.wires.lock().iter() {
            wire.wake_blocked();
        }

        if let Some(monitor) = self.monitor_thread.lock().take() {
            drop(monitor.stop);
            if monitor.handle.join().is_err() {
                warn!("health monitor thread panicked");
            }
        }

        if !self.lifecycle.wait_idle(Some(Instant::now() + SHUTDOWN_GRACE)) {
            warn!(
                grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
                "handlers still running after shutdown grace period"
            );
        }
        info!("wiring model stopped");
    }
}

impl Drop for WiringModel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model() -> WiringModel {
        WiringModel::new(WiringConfig::minimal(), HealthConfig::default()).unwrap()
    }

    #[test]
    fn rejects_duplicate_names_and_zero_capacity() {
        let model = model();
        model
            .create_wire("dup", ConcurrencyMode::Concurrent, 4, |_: u8| Ok(()))
            .unwrap();
        let err = model
            .create_wire("dup", ConcurrencyMode::Concurrent, 4, |_: u8| Ok(()))
            .unwrap_err();
        assert!(matches!(err, WireError::DuplicateWire(name) if name == "dup"));

        let err = model
            .create_sequential_wire("empty", 0, |_: u8| Ok(()))
            .unwrap_err();
        assert!(matches!(err, WireError::InvalidCapacity(_)));
        assert_eq!(model.wire_names(), vec!["dup".to_string()]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = WiringConfig {
            worker_threads: 0,
            ..WiringConfig::minimal()
        };
        assert!(matches!(
            WiringModel::new(config, HealthConfig::default()),
            Err(WireError::Pool(_))
        ));
    }

    #[test]
    fn shutdown_is_idempotent_and_blocks_new_wires() {
        let model = model();
        model.shutdown();
        model.shutdown();
        assert!(model.is_shut_down());
        assert!(matches!(
            model.create_sequential_wire("late", 4, |_: u8| Ok(())),
            Err(WireError::Shutdown { .. })
        ));
    }

    #[test]
    fn health_monitor_thread_starts_once() {
        let model = WiringModel::new(
            WiringConfig::minimal(),
            HealthConfig {
                sample_period_ms: 5,
                ..HealthConfig::default()
            },
        )
        .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let wire = model
            .create_wire("count", ConcurrencyMode::Concurrent, 8, move |_: u8| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        model.start_health_monitor().unwrap();
        model.start_health_monitor().unwrap();
        wire.submit(1).unwrap();
        model.flush();
        std::thread::sleep(Duration::from_millis(20));
        assert!(model.is_healthy());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        model.shutdown();
    }
}
