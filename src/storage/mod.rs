//! Every store lives in one state directory, which may be shared between machines.
//!  - `timer_state/<owner>.json` holds the single timer row of an owner.
//!  - `tasks.json` holds all focus tasks.
//!  - `sessions/` holds completed focus sessions, one json-lines file per UTC day.
//!
//! Stores are traits so the timer doesn't care where rows end up.

use std::path::Path;

use anyhow::Result;

pub mod entities;
pub mod error;
pub mod session_storage;
pub mod task_store;
pub mod timer_state;

use session_storage::SessionStorageImpl;
use task_store::FileTaskStore;
use timer_state::FileTimerStateStore;

/// All stores rooted in the same directory.
pub struct Stores {
    pub timer_state: FileTimerStateStore,
    pub tasks: FileTaskStore,
    pub sessions: SessionStorageImpl,
}

impl Stores {
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self {
            timer_state: FileTimerStateStore::new(dir.join("timer_state"))?,
            tasks: FileTaskStore::new(dir.join("tasks.json")),
            sessions: SessionStorageImpl::new(dir.join("sessions"))?,
        })
    }
}
