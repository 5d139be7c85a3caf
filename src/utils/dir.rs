use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

/// Application directory, created if missing.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                let mut path =
                    PathBuf::from(env::var("APPDATA").context("APPDATA should be present on Windows")?);
                path.push("pomosync");
                path
            } else {
                let mut path = env::var("XDG_STATE_HOME")
                    .map(PathBuf::from)
                    .or_else(|_| {
                        env::var("HOME").map(|home| {
                            let mut path = PathBuf::from(home);
                            path.push(".local/state");
                            path
                        })
                    })
                    .context("Couldn't find neither XDG_STATE_HOME nor HOME")?;
                path.push("pomosync");
                path
            }
        }
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
