// Timer registry: the single source of truth for every live timer
// `Timers` is the plain map; `TimerRegistry` wraps it in a lock with the clock and expiry countdowns

use crate::timers::clock::Clock;
use crate::timers::notify::ElapsedNotifier;
use crate::timers::timer::{Timer, TimerError, TimerId, TimerNotFound, TimerSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::info;

/// Timer map plus id allocator. Not synchronised; see `TimerRegistry`.
#[derive(Debug, Clone)]
pub struct Timers {
    /// Next id to hand out
    next_id: TimerId,
    /// Keyed by id, so iteration order is creation order
    timers: BTreeMap<TimerId, Timer>,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            next_id: TimerId::FIRST,
            timers: BTreeMap::new(),
        }
    }
}

impl Timers {
    fn allocate_id(&mut self) -> TimerId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Start a new running timer and return its id
    pub fn add(&mut self, duration: Duration, now: Instant) -> TimerId {
        let id = self.allocate_id();
        let timer = Timer::start(id, duration, now);
        if let Some(clobbered) = self.timers.insert(id, timer) {
            unreachable!("timer id {id} was allocated twice (clobbered {clobbered:?})");
        }
        id
    }

    /// Snapshot of every timer, newest first
    pub fn list(&self, now: Instant) -> Vec<TimerSnapshot> {
        self.timers
            .values()
            .rev()
            .map(|timer| timer.snapshot(now))
            .collect()
    }

    pub fn pause(&mut self, id: TimerId, now: Instant) -> Result<(), TimerError> {
        self.get_mut(id)?.pause(now)
    }

    pub fn resume(&mut self, id: TimerId, now: Instant) -> Result<(), TimerError> {
        self.get_mut(id)?.resume(now)
    }

    pub fn cancel(&mut self, id: TimerId) -> Result<(), TimerNotFound> {
        self.timers.remove(&id).map(|_| ()).ok_or(TimerNotFound(id))
    }

    pub fn get(&self, id: TimerId) -> Option<&Timer> {
        self.timers.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }

    fn get_mut(&mut self, id: TimerId) -> Result<&mut Timer, TimerNotFound> {
        self.timers.get_mut(&id).ok_or(TimerNotFound(id))
    }
}

/// Shared, linearizable registry used by every client session.
///
/// Each operation holds the lock for its whole duration and reads the clock
/// exactly once while holding it, so operations are totally ordered and a
/// `list` never observes a half-applied mutation.
///
/// Every running timer also has a countdown task. It is armed by `add` and
/// `resume` and aborted by `pause` and `cancel`. When it fires the timer is
/// logged and handed to the notifier, but stays Running at zero.
#[derive(Debug)]
pub struct TimerRegistry {
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn ElapsedNotifier>>,
    state: Arc<Mutex<RegistryState>>,
}

#[derive(Debug, Default)]
struct RegistryState {
    timers: Timers,
    countdowns: HashMap<TimerId, AbortHandle>,
}

impl RegistryState {
    fn disarm(&mut self, id: TimerId) {
        if let Some(countdown) = self.countdowns.remove(&id) {
            countdown.abort();
        }
    }
}

impl TimerRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            notifier: None,
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Alert `notifier` whenever a running timer reaches zero
    pub fn with_notifier(mut self, notifier: Arc<dyn ElapsedNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub async fn add(&self, duration: Duration) -> TimerId {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let id = state.timers.add(duration, now);
        self.arm(&mut state, id, duration);
        id
    }

    pub async fn list(&self) -> Vec<TimerSnapshot> {
        let state = self.state.lock().await;
        let now = self.clock.now();
        state.timers.list(now)
    }

    pub async fn pause(&self, id: TimerId) -> Result<(), TimerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.timers.pause(id, now)?;
        state.disarm(id);
        Ok(())
    }

    pub async fn resume(&self, id: TimerId) -> Result<(), TimerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.timers.resume(id, now)?;
        let remaining = state
            .timers
            .get(id)
            .map_or(Duration::ZERO, |timer| timer.remaining(now));
        self.arm(&mut state, id, remaining);
        Ok(())
    }

    pub async fn cancel(&self, id: TimerId) -> Result<(), TimerNotFound> {
        let mut state = self.state.lock().await;
        state.timers.cancel(id)?;
        state.disarm(id);
        Ok(())
    }

    /// Number of live timers
    pub async fn len(&self) -> usize {
        self.state.lock().await.timers.len()
    }

    fn arm(&self, state: &mut RegistryState, id: TimerId, after: Duration) {
        let countdown = tokio::spawn(countdown(
            Arc::clone(&self.state),
            Arc::clone(&self.clock),
            self.notifier.clone(),
            id,
            after,
        ));
        if let Some(previous) = state.countdowns.insert(id, countdown.abort_handle()) {
            previous.abort();
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        if let Ok(state) = self.state.try_lock() {
            for countdown in state.countdowns.values() {
                countdown.abort();
            }
        }
    }
}

async fn countdown(
    state: Arc<Mutex<RegistryState>>,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn ElapsedNotifier>>,
    id: TimerId,
    after: Duration,
) {
    tokio::time::sleep(after).await;

    // Pause and cancel abort this task while holding the lock, so past this
    // point the timer is still running
    let snapshot = {
        let mut state = state.lock().await;
        state.countdowns.remove(&id);
        let now = clock.now();
        state.timers.get(id).map(|timer| timer.snapshot(now))
    };
    let Some(snapshot) = snapshot else {
        return;
    };

    info!(%id, duration_ms = snapshot.duration.as_millis() as u64, "timer elapsed");
    if let Some(notifier) = notifier {
        notifier.timer_elapsed(&snapshot);
    }
}
