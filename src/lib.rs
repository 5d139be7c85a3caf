//! Pomodoro focus timer that keeps counting while nothing is watching it.
//! The countdown is stored as an absolute end time, so the cli, the background daemon, and a
//! fresh start after a reboot all see the same remaining time. Finished focus countdowns are
//! accounted to tasks and kept as session records for statistics.
//!

pub mod cli;
pub mod config;
pub mod daemon;
pub mod fs;
pub mod stats;
pub mod storage;
pub mod timer;
pub mod utils;
