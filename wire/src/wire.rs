//! A single wire: a bounded queue bound to one handler.
//!
//! The backlog of a wire counts every task that has been accepted but whose
//! handler has not yet returned, so queued and in-flight tasks both occupy
//! capacity. Submitters block on `not_full` while the backlog is at capacity.
//! A handler that submits downstream holds its worker while it blocks, so the
//! pool needs more workers than there are stages that submit onward.
//!
//! Sequential wires keep a `scheduled` flag: at most one drain job for the
//! wire exists on the pool at any time, and only that job pops from the
//! queue, which gives FIFO, non-overlapping handler invocations.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::error::WireError;

/// Result type returned by wire handlers. An `Err` drops the task and is logged.
pub type HandlerResult = anyhow::Result<()>;

/// Tasks a sequential drain job runs before yielding its worker.
const SEQUENTIAL_BATCH: usize = 64;

/// How a wire invokes its handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// At most one invocation in flight; invocations follow submission order.
    Sequential,
    /// Any number of invocations in flight; no ordering between tasks.
    Concurrent,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum Handler<T> {
    Sequential(Mutex<Box<dyn FnMut(T) -> HandlerResult + Send>>),
    Concurrent(Box<dyn Fn(T) -> HandlerResult + Send + Sync>),
}

impl<T> Handler<T> {
    fn mode(&self) -> ConcurrencyMode {
        match self {
            Handler::Sequential(_) => ConcurrencyMode::Sequential,
            Handler::Concurrent(_) => ConcurrencyMode::Concurrent,
        }
    }

    fn call(&self, task: T) -> HandlerResult {
        match self {
            Handler::Sequential(handler) => {
                let mut handler = handler.lock();
                (*handler)(task)
            }
            Handler::Concurrent(handler) => handler(task),
        }
    }
}

/// Shared shutdown flag and global outstanding-task counter for every wire
/// of one model.
pub(crate) struct Lifecycle {
    shutdown: AtomicBool,
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            outstanding: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Returns `true` for the first caller only.
    pub(crate) fn begin_shutdown(&self) -> bool {
        !self.shutdown.swap(true, Ordering::SeqCst)
    }

    fn task_accepted(&self) {
        *self.outstanding.lock() += 1;
    }

    fn task_finished(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until no task is queued or running on any wire. Returns `false`
    /// if the deadline passed first.
    pub(crate) fn wait_idle(&self, deadline: Option<Instant>) -> bool {
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            match deadline {
                Some(deadline) => {
                    if self.idle.wait_until(&mut outstanding, deadline).timed_out() {
                        return *outstanding == 0;
                    }
                }
                None => self.idle.wait(&mut outstanding),
            }
        }
        true
    }
}

/// Counters and gauges for one wire, readable without taking the queue lock.
#[derive(Debug)]
pub struct WireStats {
    name: String,
    mode: ConcurrencyMode,
    capacity: usize,
    backlog: AtomicUsize,
    squelched: AtomicBool,
    handled: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
}

impl WireStats {
    pub(crate) fn new(name: &str, mode: ConcurrencyMode, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            mode,
            capacity,
            backlog: AtomicUsize::new(0),
            squelched: AtomicBool::new(false),
            handled: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks accepted whose handler has not finished (queued plus in flight).
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    /// Backlog as a fraction of capacity.
    pub fn occupancy(&self) -> f64 {
        self.backlog() as f64 / self.capacity as f64
    }

    pub fn is_squelched(&self) -> bool {
        self.squelched.load(Ordering::SeqCst)
    }

    /// Tasks whose handler returned `Ok`.
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Tasks accepted but never handed to the handler (squelch or shutdown).
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Tasks whose handler returned `Err` or panicked.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn set_backlog(&self, backlog: usize) {
        self.backlog.store(backlog, Ordering::Release);
    }
}

struct QueueState<T> {
    queue: VecDeque<T>,
    unhandled: usize,
}

enum Wait {
    Forever,
    Until(Instant),
    Never,
}

pub(crate) struct WireInner<T> {
    stats: Arc<WireStats>,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    scheduled: AtomicBool,
    handler: Handler<T>,
    pool: Arc<rayon::ThreadPool>,
    lifecycle: Arc<Lifecycle>,
}

/// Type-erased view of a wire used by the model for shutdown and health.
pub(crate) trait WireControl: Send + Sync {
    fn stats(&self) -> &Arc<WireStats>;

    /// Wake every submitter blocked on this wire so it can observe shutdown.
    fn wake_blocked(&self);
}

impl<T: Send + 'static> WireInner<T> {
    pub(crate) fn new(
        name: &str,
        capacity: usize,
        handler: Handler<T>,
        pool: Arc<rayon::ThreadPool>,
        lifecycle: Arc<Lifecycle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            stats: Arc::new(WireStats::new(name, handler.mode(), capacity)),
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                unhandled: 0,
            }),
            not_full: Condvar::new(),
            scheduled: AtomicBool::new(false),
            handler,
            pool,
            lifecycle,
        })
    }

    fn shutdown_error(&self) -> WireError {
        WireError::Shutdown {
            wire: self.stats.name.clone(),
        }
    }

    fn enqueue(self: &Arc<Self>, task: T, wait: Wait) -> Result<bool, WireError> {
        let capacity = self.stats.capacity;
        let mut state = self.state.lock();
        loop {
            if self.lifecycle.is_shut_down() {
                return Err(self.shutdown_error());
            }
            // A squelched wire takes everything at once, full or not.
            if self.stats.is_squelched() {
                drop(state);
                self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                trace!(wire = %self.stats.name, "task discarded by squelch");
                return Ok(true);
            }
            if state.unhandled < capacity {
                break;
            }
            match wait {
                Wait::Never => return Ok(false),
                Wait::Forever => self.not_full.wait(&mut state),
                Wait::Until(deadline) => {
                    if self.not_full.wait_until(&mut state, deadline).timed_out()
                        && state.unhandled >= capacity
                        && !self.lifecycle.is_shut_down()
                        && !self.stats.is_squelched()
                    {
                        return Ok(false);
                    }
                }
            }
        }

        state.queue.push_back(task);
        state.unhandled += 1;
        self.stats.backlog.store(state.unhandled, Ordering::Release);
        self.lifecycle.task_accepted();
        drop(state);

        self.schedule();
        Ok(true)
    }

    fn schedule(self: &Arc<Self>) {
        match self.handler {
            Handler::Concurrent(_) => {
                let inner = Arc::clone(self);
                self.pool.spawn(move || inner.run_one());
            }
            Handler::Sequential(_) => {
                if self
                    .scheduled
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let inner = Arc::clone(self);
                    self.pool.spawn(move || inner.drain());
                }
            }
        }
    }

    fn run_one(&self) {
        let next = self.state.lock().queue.pop_front();
        if let Some(task) = next {
            self.invoke(task);
        }
    }

    fn drain(self: Arc<Self>) {
        let mut ran = 0usize;
        loop {
            let next = self.state.lock().queue.pop_front();
            match next {
                Some(task) => {
                    self.invoke(task);
                    ran += 1;
                    if ran >= SEQUENTIAL_BATCH {
                        // `scheduled` stays set; the respawned job continues the drain.
                        let inner = Arc::clone(&self);
                        self.pool.spawn(move || inner.drain());
                        return;
                    }
                }
                None => {
                    self.scheduled.store(false, Ordering::Release);
                    if self.state.lock().queue.is_empty() {
                        return;
                    }
                    // A task arrived after the pop; reclaim the flag unless a
                    // submitter already spawned a fresh drain job.
                    if self
                        .scheduled
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }

    fn invoke(&self, task: T) {
        if self.lifecycle.is_shut_down() || self.stats.is_squelched() {
            drop(task);
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
        } else {
            match catch_unwind(AssertUnwindSafe(|| self.handler.call(task))) {
                Ok(Ok(())) => {
                    self.stats.handled.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(wire = %self.stats.name, error = %err, "handler failed, task dropped");
                }
                Err(panic) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        wire = %self.stats.name,
                        panic = panic_message(panic.as_ref()),
                        "handler panicked, task dropped"
                    );
                }
            }
        }
        self.task_done();
    }

    fn task_done(&self) {
        {
            let mut state = self.state.lock();
            state.unhandled = state.unhandled.saturating_sub(1);
            self.stats.backlog.store(state.unhandled, Ordering::Release);
        }
        self.not_full.notify_all();
        self.lifecycle.task_finished();
    }
}

impl<T: Send + 'static> WireControl for WireInner<T> {
    fn stats(&self) -> &Arc<WireStats> {
        &self.stats
    }

    fn wake_blocked(&self) {
        let _state = self.state.lock();
        self.not_full.notify_all();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Producer-side handle to a wire. Cheap to clone; every clone feeds the same queue.
pub struct WireHandle<T> {
    inner: Arc<WireInner<T>>,
}

impl<T> Clone for WireHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WireHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireHandle")
            .field("name", &self.inner.stats.name)
            .field("mode", &self.inner.stats.mode)
            .field("capacity", &self.inner.stats.capacity)
            .field("backlog", &self.inner.stats.backlog())
            .finish()
    }
}

impl<T: Send + 'static> WireHandle<T> {
    pub(crate) fn new(inner: Arc<WireInner<T>>) -> Self {
        Self { inner }
    }

    /// Submit a task, blocking while the wire is at capacity.
    pub fn submit(&self, task: T) -> Result<(), WireError> {
        self.inner.enqueue(task, Wait::Forever).map(|_| ())
    }

    /// Submit a task, blocking for at most `timeout`. Returns `Ok(false)` if
    /// the wire stayed full; the task is dropped in that case.
    pub fn submit_timeout(&self, task: T, timeout: Duration) -> Result<bool, WireError> {
        self.inner
            .enqueue(task, Wait::Until(Instant::now() + timeout))
    }

    /// Submit a task only if there is room right now.
    pub fn offer(&self, task: T) -> Result<bool, WireError> {
        self.inner.enqueue(task, Wait::Never)
    }

    /// Accept and discard every task from now on without invoking the handler.
    pub fn squelch(&self) {
        if !self.inner.stats.squelched.swap(true, Ordering::SeqCst) {
            warn!(wire = %self.inner.stats.name, "wire squelched");
        }
        // Wake submitters blocked on a full backlog.
        let _state = self.inner.state.lock();
        self.inner.not_full.notify_all();
    }

    pub fn unsquelch(&self) {
        if self.inner.stats.squelched.swap(false, Ordering::SeqCst) {
            warn!(wire = %self.inner.stats.name, "wire unsquelched");
        }
    }

    pub fn is_squelched(&self) -> bool {
        self.inner.stats.is_squelched()
    }

    pub fn backlog(&self) -> usize {
        self.inner.stats.backlog()
    }

    pub fn capacity(&self) -> usize {
        self.inner.stats.capacity
    }

    pub fn name(&self) -> &str {
        &self.inner.stats.name
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.inner.stats.mode
    }

    pub fn stats(&self) -> Arc<WireStats> {
        Arc::clone(&self.inner.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_occupancy() {
        let stats = WireStats::new("test", ConcurrencyMode::Sequential, 8);
        assert_eq!(stats.occupancy(), 0.0);
        stats.set_backlog(6);
        assert_eq!(stats.backlog(), 6);
        assert!((stats.occupancy() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn lifecycle_shutdown_only_once() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_shut_down());
        assert!(lifecycle.begin_shutdown());
        assert!(!lifecycle.begin_shutdown());
        assert!(lifecycle.is_shut_down());
        assert!(lifecycle.wait_idle(None));
    }
}
