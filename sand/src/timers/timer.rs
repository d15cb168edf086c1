// Timer entity and its Running/Paused state machine
// Times are monotonic instants; the caller supplies `now` so one operation reads the clock once

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Unique timer identifier, allocated sequentially by the registry starting at 1.
///
/// On the wire an id is always the object `{"id": N}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "TimerIdRepr", into = "TimerIdRepr")]
pub struct TimerId(u64);

#[derive(Serialize, Deserialize)]
struct TimerIdRepr {
    id: u64,
}

impl From<TimerIdRepr> for TimerId {
    fn from(repr: TimerIdRepr) -> Self {
        TimerId(repr.id)
    }
}

impl From<TimerId> for TimerIdRepr {
    fn from(id: TimerId) -> Self {
        TimerIdRepr { id: id.0 }
    }
}

impl TimerId {
    /// The first id handed out by a fresh registry
    pub const FIRST: TimerId = TimerId(1);

    pub const fn new(raw: u64) -> Self {
        TimerId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        TimerId(self.0 + 1)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of the two states a timer is in, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Running,
    Paused,
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerPhase::Running => write!(f, "Running"),
            TimerPhase::Paused => write!(f, "Paused"),
        }
    }
}

/// Per-timer state. Each variant carries only what that state needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// Counting down; reaches zero at `due`
    Running { due: Instant },
    /// Frozen with `remaining` left on the clock
    Paused { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("timer {0} not found")]
    NotFound(TimerId),
    #[error("timer {id} is already {phase}")]
    InvalidTransition { id: TimerId, phase: TimerPhase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timer {0} not found")]
pub struct TimerNotFound(pub TimerId);

impl From<TimerNotFound> for TimerError {
    fn from(err: TimerNotFound) -> Self {
        TimerError::NotFound(err.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    id: TimerId,
    duration: Duration,
    status: TimerStatus,
}

impl Timer {
    /// Create a timer that is already running
    pub fn start(id: TimerId, duration: Duration, now: Instant) -> Self {
        Self {
            id,
            duration,
            status: TimerStatus::Running {
                due: now + duration,
            },
        }
    }

    pub fn phase(&self) -> TimerPhase {
        match self.status {
            TimerStatus::Running { .. } => TimerPhase::Running,
            TimerStatus::Paused { .. } => TimerPhase::Paused,
        }
    }

    /// Time left as of `now`; saturates at zero once a running timer is past due
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.status {
            TimerStatus::Running { due } => due.saturating_duration_since(now),
            TimerStatus::Paused { remaining } => remaining,
        }
    }

    pub fn pause(&mut self, now: Instant) -> Result<(), TimerError> {
        match self.status {
            TimerStatus::Running { due } => {
                self.status = TimerStatus::Paused {
                    remaining: due.saturating_duration_since(now),
                };
                Ok(())
            }
            TimerStatus::Paused { .. } => Err(self.invalid_transition()),
        }
    }

    pub fn resume(&mut self, now: Instant) -> Result<(), TimerError> {
        match self.status {
            TimerStatus::Paused { remaining } => {
                self.status = TimerStatus::Running {
                    due: now + remaining,
                };
                Ok(())
            }
            TimerStatus::Running { .. } => Err(self.invalid_transition()),
        }
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        let remaining = self.remaining(now);
        let state = match self.status {
            TimerStatus::Running { .. } => SnapshotState::Running { remaining },
            TimerStatus::Paused { .. } => SnapshotState::Paused { remaining },
        };
        TimerSnapshot {
            id: self.id,
            duration: self.duration,
            state,
        }
    }

    fn invalid_transition(&self) -> TimerError {
        TimerError::InvalidTransition {
            id: self.id,
            phase: self.phase(),
        }
    }
}

/// Point-in-time view of a timer handed out by `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub duration: Duration,
    pub state: SnapshotState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Running { remaining: Duration },
    Paused { remaining: Duration },
}

impl TimerSnapshot {
    pub fn phase(&self) -> TimerPhase {
        match self.state {
            SnapshotState::Running { .. } => TimerPhase::Running,
            SnapshotState::Paused { .. } => TimerPhase::Paused,
        }
    }

    pub fn remaining(&self) -> Duration {
        match self.state {
            SnapshotState::Running { remaining } | SnapshotState::Paused { remaining } => remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_start_is_running_with_full_duration() {
        let t0 = Instant::now();
        let timer = Timer::start(TimerId::FIRST, secs(60), t0);

        assert_eq!(timer.phase(), TimerPhase::Running);
        assert_eq!(timer.duration, secs(60));
        assert_eq!(timer.remaining(t0), secs(60));
        assert_eq!(timer.remaining(t0 + secs(15)), secs(45));
    }

    #[test]
    fn test_remaining_clamps_to_zero_past_due() {
        let t0 = Instant::now();
        let timer = Timer::start(TimerId::FIRST, secs(5), t0);

        assert_eq!(timer.remaining(t0 + secs(30)), Duration::ZERO);
        // Expiry does not change state
        assert_eq!(timer.phase(), TimerPhase::Running);
    }

    #[test]
    fn test_pause_freezes_remaining() {
        let t0 = Instant::now();
        let mut timer = Timer::start(TimerId::FIRST, secs(60), t0);

        timer.pause(t0 + secs(10)).unwrap();
        assert_eq!(
            timer.status,
            TimerStatus::Paused {
                remaining: secs(50)
            }
        );
        assert_eq!(timer.remaining(t0 + secs(1000)), secs(50));
    }

    #[test]
    fn test_resume_recomputes_due_from_remaining() {
        let t0 = Instant::now();
        let mut timer = Timer::start(TimerId::FIRST, secs(60), t0);
        timer.pause(t0 + secs(10)).unwrap();

        let resumed_at = t0 + secs(100);
        timer.resume(resumed_at).unwrap();
        assert_eq!(
            timer.status,
            TimerStatus::Running {
                due: resumed_at + secs(50)
            }
        );
        assert_eq!(timer.remaining(resumed_at), secs(50));
    }

    #[test]
    fn test_pause_when_paused_is_invalid_and_leaves_state() {
        let t0 = Instant::now();
        let mut timer = Timer::start(TimerId::new(7), secs(60), t0);
        timer.pause(t0 + secs(1)).unwrap();
        let before = timer.clone();

        let err = timer.pause(t0 + secs(2)).unwrap_err();
        assert_eq!(
            err,
            TimerError::InvalidTransition {
                id: TimerId::new(7),
                phase: TimerPhase::Paused
            }
        );
        assert_eq!(timer, before);
    }

    #[test]
    fn test_resume_when_running_is_invalid_and_leaves_state() {
        let t0 = Instant::now();
        let mut timer = Timer::start(TimerId::FIRST, secs(60), t0);
        let before = timer.clone();

        let err = timer.resume(t0 + secs(2)).unwrap_err();
        assert!(matches!(
            err,
            TimerError::InvalidTransition {
                phase: TimerPhase::Running,
                ..
            }
        ));
        assert_eq!(timer, before);
    }

    #[test]
    fn test_pause_after_expiry_keeps_zero() {
        let t0 = Instant::now();
        let mut timer = Timer::start(TimerId::FIRST, secs(1), t0);
        timer.pause(t0 + secs(5)).unwrap();
        assert_eq!(timer.remaining(t0 + secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_reports_millis() {
        let t0 = Instant::now();
        let timer = Timer::start(TimerId::FIRST, Duration::from_millis(1500), t0);
        let snapshot = timer.snapshot(t0 + Duration::from_millis(400));

        assert_eq!(snapshot.id, TimerId::FIRST);
        assert_eq!(snapshot.phase(), TimerPhase::Running);
        assert_eq!(snapshot.remaining(), Duration::from_millis(1100));
    }

    #[test]
    fn test_timer_id_wire_shape() {
        let json = serde_json::to_value(TimerId::new(3)).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 3 }));

        let parsed: TimerId = serde_json::from_value(serde_json::json!({ "id": 9 })).unwrap();
        assert_eq!(parsed, TimerId::new(9));
    }

    #[test]
    fn test_timer_id_display() {
        assert_eq!(TimerId::new(12).to_string(), "#12");
        assert_eq!(TimerId::FIRST.next(), TimerId::new(2));
    }
}
