//! Retrospective statistics over the session log.

pub mod analysis;

use std::{future, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use futures::{stream, Stream, StreamExt};
use tracing::error;

use crate::storage::{entities::PomodoroSessionRecord, session_storage::SessionStorage};

pub struct ExtractConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExtractConfig {
    fn filter(&self, session: PomodoroSessionRecord) -> Option<PomodoroSessionRecord> {
        (session.started_at >= self.start && session.started_at < self.end).then_some(session)
    }
}

/// Streams every session that started between the 2 dates, day file by day file.
pub fn extract_between(
    storage: impl SessionStorage,
    config: ExtractConfig,
) -> impl Stream<Item = Result<PomodoroSessionRecord>> {
    let storage = Arc::new(storage);

    let files = date_range(config.start.date_naive(), config.end.date_naive())
        .map(move |day| {
            let storage = storage.clone();
            async move { (day, storage.get_data_for(day).await) }
        })
        .buffered(4);

    files
        .flat_map(|(day, data)| match data {
            Ok(data) => stream::iter(data).map(Ok::<_, anyhow::Error>).boxed(),
            Err(e) => {
                error!("Failed to read sessions of {day} {e}");
                stream::once(future::ready(Err(anyhow::Error::from(e)))).boxed()
            }
        })
        .filter_map(move |v| future::ready(v.map(|v| config.filter(v)).transpose()))
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold(Some(start), move |current| {
        future::ready(match current {
            Some(day) if day <= end => Some((day, day.succ_opt())),
            Some(_) | None => None,
        })
    })
}
