//! The focus timer.
//!  - [machine::FocusTimer] is the pure state machine. It never reads the clock itself, every
//!    transition takes the current wall-clock time.
//!  - [controller::TimerController] owns a machine plus the stores. It persists each transition
//!    and runs completion side effects, both on a best-effort basis.
//!  - Remaining time is always derived from a fixed reference timestamp, never by decrementing a
//!    counter on each tick.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod controller;
pub mod machine;
pub mod notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Focus,
    Break,
}

impl TimerMode {
    pub fn other(self) -> Self {
        match self {
            TimerMode::Focus => TimerMode::Break,
            TimerMode::Break => TimerMode::Focus,
        }
    }
}

impl Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerMode::Focus => write!(f, "focus"),
            TimerMode::Break => write!(f, "break"),
        }
    }
}

/// Configured countdown lengths in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDurations {
    pub focus_seconds: u32,
    pub break_seconds: u32,
}

impl TimerDurations {
    pub fn from_minutes(focus: u32, break_minutes: u32) -> Self {
        Self {
            focus_seconds: focus * 60,
            break_seconds: break_minutes * 60,
        }
    }

    pub fn for_mode(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_seconds,
            TimerMode::Break => self.break_seconds,
        }
    }
}

impl Default for TimerDurations {
    fn default() -> Self {
        Self::from_minutes(25, 5)
    }
}
