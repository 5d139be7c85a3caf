use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::{
    config::Config,
    storage::{
        session_storage::SessionStorage, task_store::TaskStore, timer_state::TimerStateStore,
    },
    timer::{controller::TimerController, machine::Tick, notify::notifier_for},
    utils::{clock::Clock, time::format_countdown},
};

/// Drives a [TimerController] on a fixed schedule. Every tick recomputes the remaining time
/// from the wall clock, so a late wake-up only delays the display, never the countdown itself.
pub struct TimerRunner<S, T, R> {
    controller: TimerController<S, T, R>,
    shutdown: CancellationToken,
    tick_interval: Duration,
    reload_interval: Duration,
    time_provider: Box<dyn Clock>,
    config_dir: Option<PathBuf>,
    notifications: bool,
}

impl<S: TimerStateStore, T: TaskStore, R: SessionStorage> TimerRunner<S, T, R> {
    pub fn new(
        controller: TimerController<S, T, R>,
        shutdown: CancellationToken,
        tick_interval: Duration,
        reload_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            controller,
            shutdown,
            tick_interval,
            reload_interval,
            time_provider,
            config_dir: None,
            notifications: true,
        }
    }

    /// Re-reads `config.json` in `dir` on every reload, so duration and notification changes
    /// made from the cli reach a daemon that's already running. `config` is what the controller
    /// was built with.
    pub fn with_config_reload(mut self, dir: PathBuf, config: &Config) -> Self {
        self.config_dir = Some(dir);
        self.notifications = config.notifications;
        self
    }

    pub fn controller_mut(&mut self) -> &mut TimerController<S, T, R> {
        &mut self.controller
    }

    async fn reload_config(&mut self) {
        let Some(dir) = &self.config_dir else {
            return;
        };
        let config = match Config::load_or_create(dir) {
            Ok(config) => config,
            Err(e) => {
                warn!("Keeping current settings, failed to read config {e:?}");
                return;
            }
        };
        if config.notifications != self.notifications {
            info!("Notifications turned {}", if config.notifications { "on" } else { "off" });
            self.notifications = config.notifications;
            self.controller.set_notifier(notifier_for(config.notifications));
        }
        if config.durations() != self.controller.timer().durations() {
            info!("Durations changed to {:?}", config.durations());
            self.controller.set_durations(config.durations()).await;
        }
    }

    /// Executes the tick loop until shutdown.
    pub async fn run(mut self) -> Result<TimerController<S, T, R>> {
        let mut tick_point = self.time_provider.instant();
        let mut reload_point = tick_point + self.reload_interval;
        loop {
            tick_point += self.tick_interval;

            if self.time_provider.instant() >= reload_point {
                reload_point += self.reload_interval;
                self.reload_config().await;
                self.controller.sync_remote().await;
            }

            match self.controller.tick().await {
                Tick::Completed(completion) => info!(
                    "Finished {} countdown, switching to {}",
                    completion.mode,
                    completion.next_mode()
                ),
                Tick::Running { remaining } => trace!("{} left", format_countdown(remaining)),
                Tick::Stopped { .. } => (),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Stopping tick loop");
                    return Ok(self.controller)
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }
        }
    }
}
