pub mod process;
pub mod stats;
pub mod tasks;
pub mod timer;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{current_exe, daemon_executables, kill_previous_servers, restart_server};
use stats::{process_stats_command, StatsCommand};
use tasks::{process_task_command, TaskCommand};
use timer::{open_controller, print_status, process_timer_command, TimerCommand};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    config::Config,
    daemon::start_daemon,
    storage::Stores,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "pomosync", version, long_about = None)]
#[command(about = "Pomodoro focus timer that survives restarts", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_STATE_HOME/pomosync or $HOME/.local/state/pomosync"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true)]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Starts a daemon that runs the countdown in the background")]
    Init,
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve,
    #[command(about = "Stop currently running daemon")]
    StopDaemon,
    #[command(flatten)]
    Timer(TimerCommand),
    #[command(about = "Show or change timer settings")]
    Config {
        #[arg(long, help = "Focus length in minutes, 1 to 240")]
        focus: Option<u32>,
        #[arg(long = "break", help = "Break length in minutes, 1 to 240")]
        break_minutes: Option<u32>,
        #[arg(long)]
        notifications: Option<bool>,
    },
    #[command(about = "Manage focus tasks")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    #[command(about = "Show focus statistics for a day")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    let prefix = match args.commands {
        Commands::Serve => DAEMON_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &dir, args.log_filter, args.log)?;

    match args.commands {
        Commands::Init => {
            restart_server(&dir)?;
            println!("Started daemon");
            Ok(())
        }
        Commands::StopDaemon => {
            let stopped = kill_previous_servers(&daemon_executables(&current_exe()?))?;
            println!("Stopped {stopped} daemon(s)");
            Ok(())
        }
        Commands::Serve => start_daemon(dir).await,
        Commands::Timer(command) => {
            let config = Config::load_or_create(&dir)?;
            process_timer_command(command, &dir, &config).await
        }
        Commands::Config {
            focus,
            break_minutes,
            notifications,
        } => {
            let mut config = Config::load_or_create(&dir)?;
            let changed = focus.is_some() || break_minutes.is_some() || notifications.is_some();
            config.focus_minutes = focus.unwrap_or(config.focus_minutes);
            config.break_minutes = break_minutes.unwrap_or(config.break_minutes);
            config.notifications = notifications.unwrap_or(config.notifications);
            if changed {
                config.save(&dir)?;
                info!("Saved {config:?}");
                let mut controller = open_controller(&dir, &config).await?;
                controller.set_durations(config.durations()).await;
                print_status(&controller).await?;
            }
            println!(
                "focus {}m\tbreak {}m\tnotifications {}",
                config.focus_minutes, config.break_minutes, config.notifications
            );
            Ok(())
        }
        Commands::Task { command } => {
            let stores = Stores::open(&dir)?;
            process_task_command(command, &stores.tasks).await
        }
        Commands::Stats { command } => {
            let Stores {
                tasks, sessions, ..
            } = Stores::open(&dir)?;
            process_stats_command(command, sessions, &tasks).await
        }
    }
}
