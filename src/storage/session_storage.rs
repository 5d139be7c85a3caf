use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::date_to_record_name;

use super::{entities::PomodoroSessionRecord, error::StoreError};

/// Append-only log of completed focus sessions.
pub trait SessionStorage {
    /// Appends a record to the file of the UTC day the session started on.
    fn append(
        &self,
        record: &PomodoroSessionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Retrieves every session that started on a certain UTC day.
    fn get_data_for(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<PomodoroSessionRecord>, StoreError>> + Send;
}

impl<T: Deref> SessionStorage for T
where
    T::Target: SessionStorage,
{
    fn append(
        &self,
        record: &PomodoroSessionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.deref().append(record)
    }

    fn get_data_for(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<PomodoroSessionRecord>, StoreError>> + Send {
        self.deref().get_data_for(date)
    }
}

/// Stores sessions as json lines, one file per day.
pub struct SessionStorageImpl {
    session_dir: PathBuf,
}

impl SessionStorageImpl {
    pub fn new(session_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&session_dir)?;

        Ok(Self { session_dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.session_dir.join(date_to_record_name(date))
    }

    async fn read_day(path: &Path) -> Result<Vec<PomodoroSessionRecord>, std::io::Error> {
        debug!("Extracting {path:?}");
        let file = File::open(path).await?;
        file.lock_shared()?;
        let mut lines = BufReader::new(file).lines();
        let mut sessions = vec![];
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PomodoroSessionRecord>(&line) {
                Ok(v) => sessions.push(v),
                Err(e) => {
                    // A write cut short by a shutdown leaves half a line behind.
                    warn!("Skipping illegal session line in {path:?} {line}: {e}")
                }
            }
        }

        lines.into_inner().into_inner().unlock_async().await?;
        Ok(sessions)
    }
}

impl SessionStorage for SessionStorageImpl {
    async fn append(&self, record: &PomodoroSessionRecord) -> Result<(), StoreError> {
        let path = self.path_for(record.started_at.date_naive());
        let mut buffer = serde_json::to_vec(record)?;
        buffer.push(b'\n');

        let mut file = File::options()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        file.lock_exclusive()?;
        let written = async {
            file.write_all(&buffer).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        written?;
        debug!("Appended session {} to {path:?}", record.id);
        Ok(())
    }

    async fn get_data_for(&self, date: NaiveDate) -> Result<Vec<PomodoroSessionRecord>, StoreError> {
        match Self::read_day(&self.path_for(date)).await {
            Ok(sessions) => Ok(sessions),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use uuid::Uuid;

    use super::{SessionStorage, SessionStorageImpl};
    use crate::{storage::entities::PomodoroSessionRecord, timer::TimerMode};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn record(offset: Duration) -> PomodoroSessionRecord {
        let started_at = Utc.from_utc_datetime(&TEST_START_DATE) + offset;
        PomodoroSessionRecord {
            id: Uuid::new_v4(),
            mode: TimerMode::Focus,
            task_id: None,
            planned_seconds: 1500,
            actual_seconds: 1500,
            started_at,
            completed_at: started_at + Duration::seconds(1500),
        }
    }

    #[tokio::test]
    async fn appends_by_start_day() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;
        let first = record(Duration::hours(9));
        let second = record(Duration::hours(10));
        let next_day = record(Duration::hours(24) + Duration::minutes(50));

        storage.append(&first).await?;
        storage.append(&second).await?;
        storage.append(&next_day).await?;

        assert_eq!(
            storage.get_data_for(TEST_START_DATE.date()).await?,
            vec![first, second]
        );
        assert_eq!(
            storage
                .get_data_for(TEST_START_DATE.date().succ_opt().unwrap())
                .await?,
            vec![next_day]
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_day_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;
        assert!(storage.get_data_for(TEST_START_DATE.date()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_line_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;
        let valid = record(Duration::hours(9));
        storage.append(&valid).await?;

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("2018-07-04"))?;
        file.write_all(b"{\"id\":\"cut sho")?;

        assert_eq!(storage.get_data_for(TEST_START_DATE.date()).await?, vec![valid]);
        Ok(())
    }
}
