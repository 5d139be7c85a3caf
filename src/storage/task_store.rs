use std::{future::Future, path::PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::fs::operations::{read_json, update_json};

use super::{
    entities::{FocusTaskEntity, TaskId, TaskStatus},
    error::StoreError,
};

pub const DEFAULT_PROJECT: &str = "General";

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub estimated_pomodoros: u32,
    pub project: Option<String>,
    pub tags: Vec<String>,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimated_pomodoros: Option<u32>,
    pub project: Option<String>,
}

pub trait TaskStore {
    fn create(
        &self,
        task: NewTask,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<FocusTaskEntity, StoreError>> + Send;

    fn update(
        &self,
        id: TaskId,
        update: TaskUpdate,
    ) -> impl Future<Output = Result<FocusTaskEntity, StoreError>> + Send;

    /// Changes the estimate by `delta`, never going below one pomodoro.
    fn adjust_estimate(
        &self,
        id: TaskId,
        delta: i32,
    ) -> impl Future<Output = Result<FocusTaskEntity, StoreError>> + Send;

    fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = Result<FocusTaskEntity, StoreError>> + Send;

    /// Accounts one completed pomodoro of `minutes` to the task.
    fn record_pomodoro(
        &self,
        id: TaskId,
        minutes: u32,
    ) -> impl Future<Output = Result<FocusTaskEntity, StoreError>> + Send;

    fn get(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<FocusTaskEntity>, StoreError>> + Send;

    /// Tasks that are not completed, newest first.
    fn list_open(&self) -> impl Future<Output = Result<Vec<FocusTaskEntity>, StoreError>> + Send;

    fn count_completed(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

fn clean_title(title: &str) -> Result<String, StoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::InvalidTask("title can't be empty".into()));
    }
    Ok(title.to_string())
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_project(value: Option<&str>) -> String {
    clean_optional(value).unwrap_or_else(|| DEFAULT_PROJECT.to_string())
}

fn check_estimate(estimate: u32) -> Result<u32, StoreError> {
    if estimate == 0 {
        return Err(StoreError::InvalidTask(
            "a task needs at least one pomodoro".into(),
        ));
    }
    Ok(estimate)
}

/// Keeps every task in a single json document. Each change rewrites it under an exclusive lock.
pub struct FileTaskStore {
    path: PathBuf,
}

impl FileTaskStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn all(&self) -> Result<Vec<FocusTaskEntity>, StoreError> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    async fn modify(
        &self,
        id: TaskId,
        change: impl FnOnce(&mut FocusTaskEntity) -> Result<(), StoreError>,
    ) -> Result<FocusTaskEntity, StoreError> {
        update_json(&self.path, |tasks: &mut Option<Vec<FocusTaskEntity>>| {
            let task = tasks
                .as_mut()
                .and_then(|tasks| tasks.iter_mut().find(|t| t.id == id))
                .ok_or(StoreError::TaskNotFound(id))?;
            change(task)?;
            debug!("Updated task {id}");
            Ok(task.clone())
        })
        .await
    }
}

impl TaskStore for FileTaskStore {
    async fn create(&self, task: NewTask, now: DateTime<Utc>) -> Result<FocusTaskEntity, StoreError> {
        let entity = FocusTaskEntity {
            id: Uuid::new_v4(),
            title: clean_title(&task.title)?,
            description: clean_optional(task.description.as_deref()),
            project: clean_project(task.project.as_deref()),
            tags: task
                .tags
                .iter()
                .filter_map(|tag| clean_optional(Some(tag.as_str())))
                .collect(),
            estimated_pomodoros: check_estimate(task.estimated_pomodoros)?,
            completed_pomodoros: 0,
            total_minutes_spent: 0,
            status: TaskStatus::Backlog,
            created_at: now,
        };
        let created = entity.clone();
        update_json(&self.path, move |tasks: &mut Option<Vec<FocusTaskEntity>>| {
            tasks.get_or_insert_with(Vec::new).push(entity);
            Ok(())
        })
        .await?;
        debug!("Created task {}", created.id);
        Ok(created)
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<FocusTaskEntity, StoreError> {
        let title = update.title.as_deref().map(clean_title).transpose()?;
        let estimate = update.estimated_pomodoros.map(check_estimate).transpose()?;
        self.modify(id, move |task| {
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(description) = update.description.as_deref() {
                task.description = clean_optional(Some(description));
            }
            if let Some(estimate) = estimate {
                task.estimated_pomodoros = estimate;
            }
            if let Some(project) = update.project.as_deref() {
                task.project = clean_project(Some(project));
            }
            Ok(())
        })
        .await
    }

    async fn adjust_estimate(&self, id: TaskId, delta: i32) -> Result<FocusTaskEntity, StoreError> {
        self.modify(id, move |task| {
            task.estimated_pomodoros = (task.estimated_pomodoros as i64 + delta as i64).max(1) as u32;
            Ok(())
        })
        .await
    }

    async fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<FocusTaskEntity, StoreError> {
        self.modify(id, move |task| {
            task.status = status;
            Ok(())
        })
        .await
    }

    async fn record_pomodoro(&self, id: TaskId, minutes: u32) -> Result<FocusTaskEntity, StoreError> {
        self.modify(id, move |task| {
            task.record_pomodoro(minutes);
            Ok(())
        })
        .await
    }

    async fn get(&self, id: TaskId) -> Result<Option<FocusTaskEntity>, StoreError> {
        Ok(self.all().await?.into_iter().find(|t| t.id == id))
    }

    async fn list_open(&self) -> Result<Vec<FocusTaskEntity>, StoreError> {
        let mut tasks = self
            .all()
            .await?
            .into_iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .collect::<Vec<_>>();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn count_completed(&self) -> Result<usize, StoreError> {
        Ok(self
            .all()
            .await?
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count())
    }
}
