use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike};
use futures::TryStreamExt;
use now::DateTimeNow;
use tracing::{instrument, warn};

use crate::storage::{
    entities::PomodoroSessionRecord, session_storage::SessionStorage, task_store::TaskStore,
};

use super::{extract_between, ExtractConfig};

/// Focus outside of these hours is not charted.
pub const FIRST_CHARTED_HOUR: u32 = 5;
pub const LAST_CHARTED_HOUR: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourlyFocus {
    pub hour: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusStreak {
    pub current: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusStats {
    pub pomodoros_today: usize,
    pub focus_minutes_today: u32,
    pub hourly_focus: Vec<HourlyFocus>,
    /// `YYYY-MM-DD-HH` of the local start hour to minutes of focus, for the current month.
    pub daily_hourly_focus: BTreeMap<String, f64>,
    pub completed_tasks: usize,
    pub streak: FocusStreak,
}

fn charted(hour: u32) -> bool {
    (FIRST_CHARTED_HOUR..=LAST_CHARTED_HOUR).contains(&hour)
}

/// Sessions that completed on the local day of `day`.
pub fn sessions_completed_on<'a, Tz: TimeZone>(
    sessions: &'a [PomodoroSessionRecord],
    day: &DateTime<Tz>,
) -> Vec<&'a PomodoroSessionRecord> {
    let start = day.beginning_of_day().to_utc();
    let end = day.end_of_day().to_utc();
    sessions
        .iter()
        .filter(|s| s.completed_at >= start && s.completed_at <= end)
        .collect()
}

/// Minutes of focus per local start hour, for every charted hour.
pub fn hourly_focus<'a, Tz: TimeZone>(
    sessions: impl IntoIterator<Item = &'a PomodoroSessionRecord>,
    tz: &Tz,
) -> Vec<HourlyFocus> {
    let mut minutes = BTreeMap::<u32, f64>::new();
    for hour in FIRST_CHARTED_HOUR..=LAST_CHARTED_HOUR {
        minutes.insert(hour, 0.);
    }

    for session in sessions {
        let hour = session.started_at.with_timezone(tz).hour();
        match minutes.get_mut(&hour) {
            Some(total) => *total += session.actual_minutes(),
            None => warn!("Session {} started outside charted hours at {hour}h", session.id),
        }
    }

    minutes
        .into_iter()
        .map(|(hour, minutes)| HourlyFocus {
            hour,
            minutes: minutes.round() as u32,
        })
        .collect()
}

pub fn daily_hourly_focus<'a, Tz: TimeZone>(
    sessions: impl IntoIterator<Item = &'a PomodoroSessionRecord>,
    tz: &Tz,
) -> BTreeMap<String, f64>
where
    Tz::Offset: std::fmt::Display,
{
    let mut map = BTreeMap::new();
    for session in sessions {
        let start = session.started_at.with_timezone(tz);
        if charted(start.hour()) {
            *map.entry(start.format("%Y-%m-%d-%H").to_string())
                .or_insert(0.) += session.actual_minutes();
        }
    }
    map
}

/// Linear scan over the days that had any focus. The current streak may start yesterday, so
/// it doesn't read as broken before the first session of the day.
pub fn focus_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> FocusStreak {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days.iter().copied().filter(|d| *d <= today) {
        run = match previous {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            Some(_) | None => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    let mut current = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        current += 1;
        cursor = day.pred_opt();
    }

    FocusStreak { current, longest }
}

/// Builds every statistic for the local day of `reference`. The streak looks back at most
/// `lookback_days` days.
#[instrument(skip(storage, tasks))]
pub async fn collect_stats<Tz: TimeZone + std::fmt::Debug>(
    storage: impl SessionStorage,
    tasks: &impl TaskStore,
    reference: DateTime<Tz>,
    lookback_days: u32,
) -> Result<FocusStats>
where
    Tz::Offset: std::fmt::Display,
{
    let tz = reference.timezone();
    let month_start = reference.beginning_of_month().to_utc();
    let lookback_start =
        reference.beginning_of_day().to_utc() - Duration::days(lookback_days.max(1) as i64);
    let end = reference.end_of_day().to_utc();

    let sessions = extract_between(
        storage,
        ExtractConfig {
            start: month_start.min(lookback_start),
            end,
        },
    )
    .try_collect::<Vec<_>>()
    .await?;

    let today = sessions_completed_on(&sessions, &reference);
    let focus_minutes_today = today
        .iter()
        .fold(Duration::zero(), |acc, s| acc + s.actual_duration());

    let month = sessions.iter().filter(|s| s.started_at >= month_start);
    let days = sessions
        .iter()
        .map(|s| s.started_at.with_timezone(&tz).date_naive())
        .collect::<BTreeSet<_>>();

    Ok(FocusStats {
        pomodoros_today: today.len(),
        focus_minutes_today: (focus_minutes_today.num_seconds() as f64 / 60.).round() as u32,
        hourly_focus: hourly_focus(today.iter().copied(), &tz),
        daily_hourly_focus: daily_hourly_focus(month, &tz),
        completed_tasks: tasks.count_completed().await?,
        streak: focus_streak(&days, reference.date_naive()),
    })
}
