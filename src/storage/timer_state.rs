use std::{future::Future, path::PathBuf};

use crate::fs::operations::{read_json, write_json};

use super::{
    entities::{OwnerId, TimerSessionEntity},
    error::StoreError,
};

/// Keeps the one timer row each owner has. Writes replace the whole row, the last one wins.
pub trait TimerStateStore {
    fn fetch(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Option<TimerSessionEntity>, StoreError>> + Send;

    fn upsert(
        &self,
        session: &TimerSessionEntity,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub struct FileTimerStateStore {
    dir: PathBuf,
}

impl FileTimerStateStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, owner_id: OwnerId) -> PathBuf {
        self.dir.join(format!("{owner_id}.json"))
    }
}

impl TimerStateStore for FileTimerStateStore {
    async fn fetch(&self, owner_id: OwnerId) -> Result<Option<TimerSessionEntity>, StoreError> {
        read_json(&self.path_for(owner_id)).await
    }

    async fn upsert(&self, session: &TimerSessionEntity) -> Result<(), StoreError> {
        write_json(&self.path_for(session.owner_id), session).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use super::{FileTimerStateStore, TimerStateStore};
    use crate::{
        storage::entities::{TimerSessionEntity, DEFAULT_OWNER_ID},
        timer::TimerMode,
    };

    #[tokio::test]
    async fn upsert_then_fetch() -> Result<()> {
        let dir = tempdir()?;
        let store = FileTimerStateStore::new(dir.path().to_path_buf())?;
        assert_eq!(store.fetch(DEFAULT_OWNER_ID).await?, None);

        let now = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap();
        let running = TimerSessionEntity {
            owner_id: DEFAULT_OWNER_ID,
            mode: TimerMode::Focus,
            end_at: Some(now + Duration::minutes(25)),
            is_paused: false,
            duration_left_seconds: None,
            active_task_id: None,
            updated_at: now,
        };
        store.upsert(&running).await?;

        let paused = TimerSessionEntity {
            end_at: None,
            is_paused: true,
            duration_left_seconds: Some(37),
            ..running.clone()
        };
        store.upsert(&paused).await?;

        assert_eq!(store.fetch(DEFAULT_OWNER_ID).await?, Some(paused));
        assert_eq!(store.fetch(uuid::Uuid::new_v4()).await?, None);
        Ok(())
    }
}
