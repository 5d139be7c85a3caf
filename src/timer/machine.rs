use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, trace, warn};

use crate::{
    storage::entities::{OwnerId, TaskId, TimerSessionEntity},
    utils::time::{floor_seconds_between, seconds},
};

use super::{TimerDurations, TimerMode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("the {0} countdown is already running")]
    AlreadyRunning(TimerMode),
    #[error("the timer is not running")]
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerState {
    Idle {
        mode: TimerMode,
        remaining: u32,
    },
    /// `reference` is the moment the countdown would have started had it never been paused.
    /// Remaining time is `configured - floor(now - reference)`.
    Running {
        mode: TimerMode,
        end_at: DateTime<Utc>,
        reference: DateTime<Utc>,
        planned: u32,
    },
    Paused {
        mode: TimerMode,
        remaining: u32,
    },
}

impl TimerState {
    pub fn mode(&self) -> TimerMode {
        match self {
            TimerState::Idle { mode, .. }
            | TimerState::Running { mode, .. }
            | TimerState::Paused { mode, .. } => *mode,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running { .. })
    }
}

/// Everything a finished countdown leaves behind. Handed to the caller exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub mode: TimerMode,
    pub task_id: Option<TaskId>,
    pub planned_seconds: u32,
    pub actual_seconds: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Completion {
    pub fn next_mode(&self) -> TimerMode {
        self.mode.other()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Stopped { remaining: u32 },
    Running { remaining: u32 },
    Completed(Completion),
}

/// Pomodoro countdown state machine.
///
/// Idle and Paused both hold an exact number of seconds. Running only holds timestamps, so the
/// remaining time stays correct no matter how irregularly [FocusTimer::tick] gets called.
#[derive(Debug, Clone)]
pub struct FocusTimer {
    state: TimerState,
    durations: TimerDurations,
    active_task: Option<TaskId>,
}

impl FocusTimer {
    pub fn new(durations: TimerDurations) -> Self {
        Self {
            state: TimerState::Idle {
                mode: TimerMode::Focus,
                remaining: durations.for_mode(TimerMode::Focus),
            },
            durations,
            active_task: None,
        }
    }

    /// Rebuilds the machine from the last persisted snapshot.
    ///
    /// A running snapshot whose end already passed completes immediately. The completion is
    /// returned so the caller can run the side effects that were missed while nothing was
    /// watching the timer.
    pub fn restore(
        durations: TimerDurations,
        session: Option<&TimerSessionEntity>,
        now: DateTime<Utc>,
    ) -> (Self, Option<Completion>) {
        let mut timer = Self::new(durations);
        let Some(session) = session else {
            return (timer, None);
        };

        timer.active_task = session.active_task_id;
        let mode = session.mode;
        let configured = durations.for_mode(mode);

        match (session.is_paused, session.end_at) {
            (false, Some(end_at)) => {
                timer.state = TimerState::Running {
                    mode,
                    end_at,
                    reference: end_at - seconds(configured),
                    planned: configured,
                };
                match timer.tick(now) {
                    Tick::Completed(completion) => {
                        info!("Catching up on a {mode} countdown that ended at {end_at}");
                        (timer, Some(completion))
                    }
                    Tick::Running { remaining } => {
                        info!("Resuming {mode} countdown with {remaining}s left");
                        (timer, None)
                    }
                    Tick::Stopped { .. } => (timer, None),
                }
            }
            (false, None) => {
                warn!("Stored timer claims to be running without an end, falling back to defaults");
                timer.state = TimerState::Idle {
                    mode,
                    remaining: configured,
                };
                (timer, None)
            }
            (true, _) => {
                timer.state = match session.duration_left_seconds {
                    Some(left) if left != configured => TimerState::Paused {
                        mode,
                        remaining: left,
                    },
                    Some(_) | None => TimerState::Idle {
                        mode,
                        remaining: configured,
                    },
                };
                (timer, None)
            }
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode()
    }

    pub fn durations(&self) -> TimerDurations {
        self.durations
    }

    pub fn active_task(&self) -> Option<TaskId> {
        self.active_task
    }

    pub fn select_task(&mut self, task: Option<TaskId>) {
        self.active_task = task;
    }

    /// Seconds left at `now`. Never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
        match &self.state {
            TimerState::Idle { remaining, .. } | TimerState::Paused { remaining, .. } => {
                *remaining
            }
            TimerState::Running {
                mode, reference, ..
            } => self.remaining_from(*mode, *reference, now),
        }
    }

    /// Share of the current countdown that already passed, from 0 to 100.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        let total = self.durations.for_mode(self.mode());
        if total == 0 {
            return 0.;
        }
        let elapsed = total.saturating_sub(self.remaining(now));
        (elapsed as f64 / total as f64 * 100.).clamp(0., 100.)
    }

    fn remaining_from(&self, mode: TimerMode, reference: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        let configured = self.durations.for_mode(mode) as i64;
        let elapsed = floor_seconds_between(reference, now);
        (configured - elapsed).clamp(0, u32::MAX as i64) as u32
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        let (mode, remaining) = match self.state {
            TimerState::Running { mode, .. } => return Err(TimerError::AlreadyRunning(mode)),
            TimerState::Idle { mode, remaining } | TimerState::Paused { mode, remaining } => {
                (mode, remaining)
            }
        };
        let configured = self.durations.for_mode(mode);
        let end_at = now + seconds(remaining);
        self.state = TimerState::Running {
            mode,
            end_at,
            reference: now - (seconds(configured) - seconds(remaining)),
            planned: configured,
        };
        info!("Started {mode} countdown, ends at {end_at}");
        Ok(())
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<u32, TimerError> {
        let TimerState::Running { mode, .. } = self.state else {
            return Err(TimerError::NotRunning);
        };
        let remaining = self.remaining(now);
        self.state = TimerState::Paused { mode, remaining };
        info!("Paused {mode} countdown with {remaining}s left");
        Ok(remaining)
    }

    pub fn stop(&mut self) {
        let mode = self.mode();
        self.state = TimerState::Idle {
            mode,
            remaining: self.durations.for_mode(mode),
        };
        info!("Stopped {mode} countdown");
    }

    pub fn skip(&mut self) {
        let mode = self.mode().other();
        self.state = TimerState::Idle {
            mode,
            remaining: self.durations.for_mode(mode),
        };
        info!("Skipped to {mode}");
    }

    /// A stopped timer picks up the new length right away. A running one keeps its reference,
    /// so the change shortens or stretches the countdown in flight.
    pub fn set_durations(&mut self, durations: TimerDurations) {
        self.durations = durations;
        self.state = match self.state {
            TimerState::Idle { mode, .. } | TimerState::Paused { mode, .. } => TimerState::Idle {
                mode,
                remaining: durations.for_mode(mode),
            },
            TimerState::Running {
                mode,
                reference,
                planned,
                ..
            } => TimerState::Running {
                mode,
                end_at: reference + seconds(durations.for_mode(mode)),
                reference,
                planned,
            },
        };
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Tick {
        match self.state {
            TimerState::Idle { remaining, .. } | TimerState::Paused { remaining, .. } => {
                Tick::Stopped { remaining }
            }
            TimerState::Running {
                mode,
                reference,
                planned,
                ..
            } => {
                let remaining = self.remaining_from(mode, reference, now);
                trace!("{mode} tick, {remaining}s left");
                if remaining > 0 {
                    Tick::Running { remaining }
                } else {
                    Tick::Completed(self.complete(mode, reference, planned))
                }
            }
        }
    }

    /// Leaves Running before anything else happens, so the completion can't be produced twice.
    fn complete(&mut self, mode: TimerMode, reference: DateTime<Utc>, planned: u32) -> Completion {
        let actual = self.durations.for_mode(mode);
        let completion = Completion {
            mode,
            task_id: self.active_task,
            planned_seconds: planned,
            actual_seconds: actual,
            started_at: reference,
            completed_at: reference + seconds(actual),
        };
        let next = mode.other();
        self.state = TimerState::Idle {
            mode: next,
            remaining: self.durations.for_mode(next),
        };
        info!("Completed {mode} countdown, next up is {next}");
        completion
    }

    /// The row that represents the current state in the timer store.
    pub fn snapshot(&self, owner_id: OwnerId, now: DateTime<Utc>) -> TimerSessionEntity {
        let (end_at, is_paused, duration_left_seconds) = match self.state {
            TimerState::Running { end_at, .. } => (Some(end_at), false, None),
            TimerState::Idle { remaining, .. } | TimerState::Paused { remaining, .. } => {
                (None, true, Some(remaining))
            }
        };
        TimerSessionEntity {
            owner_id,
            mode: self.mode(),
            end_at,
            is_paused,
            duration_left_seconds,
            active_task_id: self.active_task,
            updated_at: now,
        }
    }
}
