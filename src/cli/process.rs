use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::{info, warn};

/// Stops every other process running one of `executables`. Returns how many were stopped.
pub fn kill_previous_servers(executables: &[PathBuf]) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't find own pid: {e}"))?;
    let mut killed = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| executables.iter().any(|name| name == v))
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // SIGTERM lets the daemon finish its current write.
            if process.kill_with(Signal::Term).is_none() {
                warn!("SIGTERM isn't supported here, killing {pid}");
                process.kill();
            }
            process.wait();
            killed += 1;
        }
    }
    Ok(killed)
}

/// Shuts down the previous daemon and starts a new one as `pomosync serve` in its own process
/// group, detached from the terminal.
pub fn restart_server(dir: &Path) -> Result<()> {
    let process_name = current_exe()?;
    kill_previous_servers(&daemon_executables(&process_name))?;
    let mut command = std::process::Command::new(process_name);
    command.arg("--dir").arg(dir).arg("serve");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    #[allow(clippy::zombie_processes)]
    let child = command.spawn()?;
    info!("Spawned daemon {}", child.id());
    Ok(())
}

/// A daemon is either this executable running `serve` or the standalone daemon binary next to it.
pub fn daemon_executables(cli: &Path) -> Vec<PathBuf> {
    let mut daemon = cli.to_path_buf();
    daemon.set_file_name("pomosync-daemon");
    if let Some(extension) = cli.extension() {
        daemon.set_extension(extension);
    }
    vec![cli.to_path_buf(), daemon]
}

pub fn current_exe() -> Result<PathBuf> {
    env::current_exe().map_err(|e| anyhow!("Can't operate without an executable: {e}"))
}
