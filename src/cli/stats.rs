use std::fmt::Display;

use ansi_term::Colour;
use anyhow::Result;
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    stats::analysis::{collect_stats, FocusStats},
    storage::{session_storage::SessionStorage, task_store::TaskStore},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(
        long,
        short,
        help = "Day to report on. Examples are \"yesterday\", \"15/03/2025\". Today by default"
    )]
    day: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long,
        default_value_t = 365,
        help = "How many days back the focus streak is searched"
    )]
    lookback: u32,
}

pub async fn process_stats_command(
    StatsCommand {
        day,
        date_style,
        lookback,
    }: StatsCommand,
    sessions: impl SessionStorage,
    tasks: &impl TaskStore,
) -> Result<()> {
    let reference = parse_day(day, date_style)?;
    let stats = collect_stats(sessions, tasks, reference, lookback).await?;
    print_stats(&reference, &stats);
    Ok(())
}

fn parse_day(day: Option<String>, date_style: DateStyle) -> Result<DateTime<Local>> {
    let now = Local::now();
    match day.map(|s| parse_date_string(&s, now, date_style.into())) {
        Some(Ok(v)) => Ok(v.with_timezone(&Local)),
        Some(Err(e)) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate day {e}"),
            )
            .into()),
        None => Ok(now),
    }
}

fn print_stats(reference: &DateTime<Local>, stats: &FocusStats) {
    println!(
        "{}",
        Colour::White
            .bold()
            .paint(reference.format("%A %x").to_string())
    );
    println!(
        "{} pomodoros\t{}m focused\t{} tasks completed",
        stats.pomodoros_today, stats.focus_minutes_today, stats.completed_tasks
    );
    println!(
        "streak {} days\tlongest {} days",
        stats.streak.current, stats.streak.longest
    );
    println!();

    let peak = stats
        .hourly_focus
        .iter()
        .map(|h| h.minutes)
        .max()
        .unwrap_or(0)
        .max(1);
    for hour in &stats.hourly_focus {
        let width = (hour.minutes as usize * 30).div_ceil(peak as usize);
        println!(
            "{:02}:00\t{:>3}m\t{}",
            hour.hour,
            hour.minutes,
            Colour::Red.paint("#".repeat(width))
        );
    }

    let month_minutes = stats.daily_hourly_focus.values().sum::<f64>();
    println!();
    println!(
        "{:.0}m focused this month over {} hours",
        month_minutes,
        stats.daily_hourly_focus.len()
    );
}
