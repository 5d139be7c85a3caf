use std::path::{Path, PathBuf};

use anyhow::Result;
use runner::TimerRunner;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::Config,
    storage::{
        session_storage::SessionStorageImpl, task_store::FileTaskStore,
        timer_state::FileTimerStateStore, Stores,
    },
    timer::{
        controller::TimerController,
        notify::{notifier_for, Notifier},
    },
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod runner;
pub mod shutdown;

type FileRunner = TimerRunner<FileTimerStateStore, FileTaskStore, SessionStorageImpl>;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let dir = std::path::absolute(&dir)?;
    std::env::set_current_dir("/")?;

    let config = Config::load_or_create(&dir)?;
    info!("Starting timer daemon in {dir:?} with {config:?}");

    let shutdown_token = CancellationToken::new();
    let runner = create_runner(
        &dir,
        &config,
        notifier_for(config.notifications),
        &shutdown_token,
        DefaultClock,
    )
    .await?
    .with_config_reload(dir.clone(), &config);

    let (_, run_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        runner.run(),
    );

    if let Err(e) = run_result {
        error!("Tick loop got an error {e:?}");
    }

    Ok(())
}

async fn create_runner(
    dir: &Path,
    config: &Config,
    notifier: Box<dyn Notifier>,
    shutdown_token: &CancellationToken,
    clock: impl Clock + Clone,
) -> Result<FileRunner> {
    let Stores {
        timer_state,
        tasks,
        sessions,
    } = Stores::open(dir)?;
    let controller = TimerController::load(
        config.owner_id,
        config.durations(),
        timer_state,
        tasks,
        sessions,
        notifier,
        Box::new(clock.clone()),
    )
    .await;

    Ok(TimerRunner::new(
        controller,
        shutdown_token.clone(),
        config.tick_interval(),
        config.reload_interval(),
        Box::new(clock),
    ))
}
