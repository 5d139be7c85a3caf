use std::path::Path;

use ansi_term::Colour;
use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use crate::{
    config::Config,
    storage::{
        session_storage::SessionStorageImpl,
        task_store::{FileTaskStore, TaskStore},
        timer_state::FileTimerStateStore,
        Stores,
    },
    timer::{
        controller::TimerController,
        machine::{TimerError, TimerState},
        notify::notifier_for,
        TimerMode,
    },
    utils::{clock::DefaultClock, time::format_countdown},
};

type FileController = TimerController<FileTimerStateStore, FileTaskStore, SessionStorageImpl>;

#[derive(Subcommand, Debug)]
pub enum TimerCommand {
    #[command(about = "Start or resume the countdown")]
    Start {
        #[arg(long, help = "Id of the task to focus on")]
        task: Option<uuid::Uuid>,
    },
    #[command(about = "Pause the running countdown")]
    Pause,
    #[command(about = "Reset the current countdown to its full length")]
    Stop,
    #[command(about = "Switch between focus and break without recording anything")]
    Skip,
    #[command(about = "Show the current countdown")]
    Status,
    #[command(about = "Select the task that focus time is accounted to")]
    Select {
        #[arg(help = "Task id, leave empty to clear the selection")]
        task: Option<uuid::Uuid>,
    },
}

/// Resumes the persisted session the same way the daemon does, so a countdown that ran out
/// while nothing was running completes here.
pub async fn open_controller(dir: &Path, config: &Config) -> Result<FileController> {
    let Stores {
        timer_state,
        tasks,
        sessions,
    } = Stores::open(dir)?;
    Ok(TimerController::load(
        config.owner_id,
        config.durations(),
        timer_state,
        tasks,
        sessions,
        notifier_for(config.notifications),
        Box::new(DefaultClock),
    )
    .await)
}

pub async fn process_timer_command(
    command: TimerCommand,
    dir: &Path,
    config: &Config,
) -> Result<()> {
    let mut controller = open_controller(dir, config).await?;
    match command {
        TimerCommand::Start { task } => {
            if let Some(task) = task {
                if controller.tasks().get(task).await?.is_none() {
                    anyhow::bail!("No task with id {task}");
                }
                controller.select_task(Some(task)).await;
            }
            match controller.start().await {
                Ok(()) => (),
                Err(TimerError::AlreadyRunning(mode)) => {
                    println!("The {mode} countdown is already running");
                }
                Err(e) => return Err(e.into()),
            }
        }
        TimerCommand::Pause => match controller.pause().await {
            Ok(remaining) => info!("Paused with {remaining}s left"),
            Err(TimerError::NotRunning) => println!("Nothing is running"),
            Err(e) => return Err(e.into()),
        },
        TimerCommand::Stop => controller.stop().await,
        TimerCommand::Skip => controller.skip().await,
        TimerCommand::Status => (),
        TimerCommand::Select { task } => {
            if let Some(task) = task {
                if controller.tasks().get(task).await?.is_none() {
                    anyhow::bail!("No task with id {task}");
                }
            }
            controller.select_task(task).await;
        }
    }

    print_status(&controller).await
}

pub async fn print_status(controller: &FileController) -> Result<()> {
    let timer = controller.timer();
    let now = controller.now();
    let mode = match timer.mode() {
        TimerMode::Focus => Colour::Red.bold().paint("Focus"),
        TimerMode::Break => Colour::Green.bold().paint("Break"),
    };
    let state = match timer.state() {
        TimerState::Idle { .. } => "ready",
        TimerState::Running { .. } => "running",
        TimerState::Paused { .. } => "paused",
    };
    println!(
        "{mode}\t{}\t{state}\t{:.0}%",
        format_countdown(timer.remaining(now)),
        timer.progress(now)
    );

    if let Some(task_id) = timer.active_task() {
        match controller.tasks().get(task_id).await? {
            Some(task) => println!(
                "{}\t{}/{} pomodoros, {} to go",
                task.title,
                task.completed_pomodoros,
                task.estimated_pomodoros,
                task.remaining_pomodoros()
            ),
            None => println!("{}", Colour::Yellow.paint("Selected task no longer exists")),
        }
    }
    Ok(())
}
