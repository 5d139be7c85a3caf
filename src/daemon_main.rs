use std::env::args;

use anyhow::Result;
use clap::Parser;
use pomosync::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    // Resolve the directory before detaching, the daemon runs from "/".
    let app_dir = args.dir.clone().map_or_else(create_application_default_path, Ok)?;
    let app_dir = std::path::absolute(app_dir)?;

    if !args.force {
        #[cfg(unix)]
        {
            use daemonize::Daemonize;

            let daemonize = Daemonize::new()
                .stdout(daemonize::Stdio::devnull())
                .stderr(daemonize::Stdio::devnull())
                // stdin defaults to /dev/null in daemonize 0.5 (no builder method).
                .execute();
            match daemonize {
                daemonize::Outcome::Parent(parent) => {
                    parent.inspect_err(|e| {
                        eprintln!("Failed to create daemon on parent side {e:?}")
                    })?;
                    println!("Created daemon");
                    return Ok(());
                }
                daemonize::Outcome::Child(child) => {
                    child?;
                }
            }
        }
    }

    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    single_thread_runtime()?.block_on(start_daemon(app_dir))
}
