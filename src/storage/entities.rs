use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::TimerMode;

pub type TaskId = Uuid;
pub type OwnerId = Uuid;

/// Owner identity used when nothing else is configured. The deployment only ever has one user.
pub const DEFAULT_OWNER_ID: OwnerId = Uuid::from_u128(1);

/// The persisted, authoritative snapshot of the focus timer. One row per owner.
///
/// While running only `end_at` matters, remaining time is always derived from it. While paused
/// `end_at` is cleared and `duration_left_seconds` is the remaining time.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSessionEntity {
    pub owner_id: OwnerId,
    pub mode: TimerMode,
    pub end_at: Option<DateTime<Utc>>,
    pub is_paused: bool,
    pub duration_left_seconds: Option<u32>,
    pub active_task_id: Option<TaskId>,
    pub updated_at: DateTime<Utc>,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    InProgress,
    Completed,
    Skipped,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Backlog => write!(f, "backlog"),
            TaskStatus::InProgress => write!(f, "in progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FocusTaskEntity {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub project: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: u32,
    pub total_minutes_spent: u32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl FocusTaskEntity {
    /// Accounts for one fully completed pomodoro. Reaching the estimate completes the task.
    pub fn record_pomodoro(&mut self, minutes: u32) {
        self.completed_pomodoros += 1;
        self.total_minutes_spent += minutes;
        self.status = if self.completed_pomodoros >= self.estimated_pomodoros {
            TaskStatus::Completed
        } else {
            TaskStatus::InProgress
        };
    }

    pub fn remaining_pomodoros(&self) -> u32 {
        self.estimated_pomodoros.saturating_sub(self.completed_pomodoros)
    }
}

/// Immutable record of one completed focus interval. Only ever appended, and only read back for
/// statistics.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSessionRecord {
    pub id: Uuid,
    pub mode: TimerMode,
    pub task_id: Option<TaskId>,
    pub planned_seconds: u32,
    pub actual_seconds: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PomodoroSessionRecord {
    pub fn actual_duration(&self) -> Duration {
        Duration::seconds(self.actual_seconds as i64)
    }

    pub fn actual_minutes(&self) -> f64 {
        self.actual_seconds as f64 / 60.
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{FocusTaskEntity, TaskStatus, TimerSessionEntity, DEFAULT_OWNER_ID};
    use crate::timer::TimerMode;

    fn task(estimated: u32, completed: u32) -> FocusTaskEntity {
        FocusTaskEntity {
            id: uuid::Uuid::new_v4(),
            title: "write report".into(),
            description: None,
            project: "General".into(),
            tags: vec![],
            estimated_pomodoros: estimated,
            completed_pomodoros: completed,
            total_minutes_spent: completed * 25,
            status: TaskStatus::Backlog,
            created_at: Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn record_pomodoro_moves_to_in_progress() {
        let mut task = task(3, 0);
        task.record_pomodoro(25);
        assert_eq!(task.completed_pomodoros, 1);
        assert_eq!(task.total_minutes_spent, 25);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.remaining_pomodoros(), 2);
    }

    #[test]
    fn record_pomodoro_completes_at_estimate() {
        let mut task = task(2, 1);
        task.record_pomodoro(30);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.total_minutes_spent, 55);
    }

    #[test]
    fn timer_session_wire_names() {
        let session = TimerSessionEntity {
            owner_id: DEFAULT_OWNER_ID,
            mode: TimerMode::Break,
            end_at: None,
            is_paused: true,
            duration_left_seconds: Some(37),
            active_task_id: None,
            updated_at: Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["mode"], "break");
        assert_eq!(json["isPaused"], true);
        assert_eq!(json["durationLeftSeconds"], 37);
        assert_eq!(json["ownerId"], "00000000-0000-0000-0000-000000000001");
    }
}
