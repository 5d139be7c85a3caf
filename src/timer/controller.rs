use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    storage::{
        entities::{OwnerId, PomodoroSessionRecord, TaskId, TimerSessionEntity},
        session_storage::SessionStorage,
        task_store::TaskStore,
        timer_state::TimerStateStore,
    },
    utils::clock::Clock,
};

use super::{
    machine::{Completion, FocusTimer, Tick, TimerError},
    notify::Notifier,
    TimerDurations, TimerMode,
};

/// Glues a [FocusTimer] to the stores.
///
/// Every transition is applied in memory first and then persisted. Persisting and the completion
/// side effects are best-effort: failures are logged and the countdown carries on locally, the
/// stored row simply stays stale until the next successful write.
///
/// `last_row` is only ever a row that was actually read from or written to the store, so a
/// failed write never makes the stored row look like a change made elsewhere.
pub struct TimerController<S, T, R> {
    timer: FocusTimer,
    owner_id: OwnerId,
    state_store: S,
    tasks: T,
    sessions: R,
    notifier: Box<dyn Notifier>,
    clock: Box<dyn Clock>,
    last_row: Option<TimerSessionEntity>,
    unsaved_at: Option<DateTime<Utc>>,
}

impl<S: TimerStateStore, T: TaskStore, R: SessionStorage> TimerController<S, T, R> {
    /// Resume-on-load. Reads the stored row and rebuilds the machine from it. A countdown that
    /// ran out while nothing was watching completes right here, side effects included.
    pub async fn load(
        owner_id: OwnerId,
        durations: TimerDurations,
        state_store: S,
        tasks: T,
        sessions: R,
        notifier: Box<dyn Notifier>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut controller = Self {
            timer: FocusTimer::new(durations),
            owner_id,
            state_store,
            tasks,
            sessions,
            notifier,
            clock,
            last_row: None,
            unsaved_at: None,
        };
        let row = controller.fetch_row().await;
        controller.apply_row(row).await;
        controller
    }

    async fn fetch_row(&self) -> Option<TimerSessionEntity> {
        match self.state_store.fetch(self.owner_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!("Failed to fetch timer state, using defaults: {e}");
                None
            }
        }
    }

    async fn apply_row(&mut self, row: Option<TimerSessionEntity>) {
        let now = self.clock.time();
        let (timer, completion) = FocusTimer::restore(self.timer.durations(), row.as_ref(), now);
        self.timer = timer;
        self.last_row = row;
        self.unsaved_at = None;
        if let Some(completion) = completion {
            self.finish(completion).await;
        }
    }

    /// Picks up writes made by another process since we last read or wrote the row. Returns
    /// whether anything changed.
    ///
    /// While a local change is still unsaved, only a row written after it replaces the local
    /// state. Anything older is the row our failed write should have replaced, so the write is
    /// retried instead.
    pub async fn sync_remote(&mut self) -> bool {
        let row = match self.state_store.fetch(self.owner_id).await {
            Ok(row) => row,
            Err(e) => {
                debug!("Failed to refresh timer state, keeping local copy: {e}");
                return false;
            }
        };
        let changed = match (&row, &self.last_row) {
            (Some(row), Some(last)) => row.updated_at != last.updated_at,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let newer_than_local = match (&row, self.unsaved_at) {
            (Some(row), Some(unsaved_at)) => row.updated_at > unsaved_at,
            _ => true,
        };

        if changed && newer_than_local {
            info!("Timer state was changed elsewhere, resuming from it");
            self.apply_row(row).await;
            return true;
        }
        if changed {
            self.last_row = row;
        }
        if self.unsaved_at.is_some() {
            self.persist().await;
        }
        false
    }

    pub fn timer(&self) -> &FocusTimer {
        &self.timer
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub fn remaining(&self) -> u32 {
        self.timer.remaining(self.clock.time())
    }

    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), TimerError> {
        self.timer.start(self.clock.time())?;
        self.persist().await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn pause(&mut self) -> Result<u32, TimerError> {
        let remaining = self.timer.pause(self.clock.time())?;
        self.persist().await;
        Ok(remaining)
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        self.timer.stop();
        self.persist().await;
    }

    #[instrument(skip(self))]
    pub async fn skip(&mut self) {
        self.timer.skip();
        self.persist().await;
    }

    pub async fn select_task(&mut self, task: Option<TaskId>) {
        self.timer.select_task(task);
        self.persist().await;
    }

    pub async fn set_durations(&mut self, durations: TimerDurations) {
        self.timer.set_durations(durations);
        self.persist().await;
    }

    pub fn set_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifier = notifier;
    }

    /// Advances the countdown. A completion found here runs its side effects before returning.
    pub async fn tick(&mut self) -> Tick {
        let tick = self.timer.tick(self.clock.time());
        if let Tick::Completed(completion) = &tick {
            self.finish(completion.clone()).await;
        }
        tick
    }

    async fn persist(&mut self) {
        let row = self.timer.snapshot(self.owner_id, self.clock.time());
        match self.state_store.upsert(&row).await {
            Ok(()) => {
                debug!("Persisted timer state {row:?}");
                self.last_row = Some(row);
                self.unsaved_at = None;
            }
            Err(e) => {
                error!("Failed to persist timer state, continuing locally: {e}");
                self.unsaved_at = Some(row.updated_at);
            }
        }
    }

    /// Side effects of a finished countdown. The machine already moved to the next mode, so
    /// whatever happens here can't fire a second time for the same countdown.
    async fn finish(&mut self, completion: Completion) {
        if completion.mode == TimerMode::Focus {
            self.account_focus(&completion).await;
        }
        if let Err(e) = self.notifier.notify(&completion) {
            warn!("Failed to show completion notification: {e:?}");
        }
        self.persist().await;
    }

    async fn account_focus(&self, completion: &Completion) {
        if let Some(task_id) = completion.task_id {
            match self
                .tasks
                .record_pomodoro(task_id, completion.planned_seconds / 60)
                .await
            {
                Ok(task) => info!(
                    "Task {} now at {}/{} pomodoros",
                    task.title, task.completed_pomodoros, task.estimated_pomodoros
                ),
                Err(e) => error!("Failed to account pomodoro to task {task_id}: {e}"),
            }
        }

        let record = PomodoroSessionRecord {
            id: Uuid::new_v4(),
            mode: completion.mode,
            task_id: completion.task_id,
            planned_seconds: completion.planned_seconds,
            actual_seconds: completion.actual_seconds,
            started_at: completion.started_at,
            completed_at: completion.completed_at,
        };
        if let Err(e) = self.sessions.append(&record).await {
            error!("Failed to save session record: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use super::TimerController;
    use crate::{
        storage::{
            entities::{OwnerId, TimerSessionEntity, DEFAULT_OWNER_ID},
            error::StoreError,
            session_storage::{SessionStorage, SessionStorageImpl},
            task_store::{FileTaskStore, NewTask, TaskStore},
            timer_state::{FileTimerStateStore, TimerStateStore},
            Stores,
        },
        timer::{machine::Tick, notify::MockNotifier, TimerDurations, TimerMode},
        utils::{clock::ManualClock, logging::TEST_LOGGING},
    };

    type Controller = TimerController<FileTimerStateStore, FileTaskStore, SessionStorageImpl>;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap()
    }

    fn counting_notifier(count: Arc<AtomicUsize>) -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        notifier
    }

    async fn load(dir: &TempDir, clock: &ManualClock, notifier: MockNotifier) -> Result<Controller> {
        let Stores {
            timer_state,
            tasks,
            sessions,
        } = Stores::open(dir.path())?;
        Ok(TimerController::load(
            DEFAULT_OWNER_ID,
            TimerDurations::from_minutes(25, 5),
            timer_state,
            tasks,
            sessions,
            Box::new(notifier),
            Box::new(clock.clone()),
        )
        .await)
    }

    /// File store that refuses writes while `writable` is unset.
    struct FlakyStateStore {
        inner: FileTimerStateStore,
        writable: Arc<AtomicBool>,
    }

    impl TimerStateStore for FlakyStateStore {
        async fn fetch(&self, owner_id: OwnerId) -> Result<Option<TimerSessionEntity>, StoreError> {
            self.inner.fetch(owner_id).await
        }

        async fn upsert(&self, session: &TimerSessionEntity) -> Result<(), StoreError> {
            if !self.writable.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk is read-only").into());
            }
            self.inner.upsert(session).await
        }
    }

    async fn load_flaky(
        dir: &TempDir,
        clock: &ManualClock,
        notifier: MockNotifier,
        writable: Arc<AtomicBool>,
    ) -> Result<TimerController<FlakyStateStore, FileTaskStore, SessionStorageImpl>> {
        let Stores {
            timer_state,
            tasks,
            sessions,
        } = Stores::open(dir.path())?;
        Ok(TimerController::load(
            DEFAULT_OWNER_ID,
            TimerDurations::from_minutes(25, 5),
            FlakyStateStore {
                inner: timer_state,
                writable,
            },
            tasks,
            sessions,
            Box::new(notifier),
            Box::new(clock.clone()),
        )
        .await)
    }

    async fn seed_row(dir: &TempDir, row: TimerSessionEntity) -> Result<()> {
        Stores::open(dir.path())?.timer_state.upsert(&row).await?;
        Ok(())
    }

    async fn all_sessions(dir: &TempDir) -> Result<usize> {
        let sessions = Stores::open(dir.path())?.sessions;
        Ok(sessions.get_data_for(start_time().date_naive()).await?.len())
    }

    #[tokio::test]
    async fn resume_after_reload_mid_focus() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        seed_row(
            &dir,
            TimerSessionEntity {
                owner_id: DEFAULT_OWNER_ID,
                mode: TimerMode::Focus,
                end_at: Some(start_time() + Duration::seconds(90)),
                is_paused: false,
                duration_left_seconds: None,
                active_task_id: None,
                updated_at: start_time(),
            },
        )
        .await?;

        clock.advance(Duration::seconds(30));
        let controller = load(&dir, &clock, MockNotifier::new()).await?;

        assert!(controller.timer().state().is_running());
        let remaining = controller.remaining();
        assert!((59..=61).contains(&remaining), "remaining was {remaining}");
        Ok(())
    }

    #[tokio::test]
    async fn catch_up_completes_exactly_once() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        let task = Stores::open(dir.path())?
            .tasks
            .create(
                NewTask {
                    title: "write report".into(),
                    estimated_pomodoros: 4,
                    ..Default::default()
                },
                start_time(),
            )
            .await?;
        seed_row(
            &dir,
            TimerSessionEntity {
                owner_id: DEFAULT_OWNER_ID,
                mode: TimerMode::Focus,
                end_at: Some(start_time() - Duration::seconds(5)),
                is_paused: false,
                duration_left_seconds: None,
                active_task_id: Some(task.id),
                updated_at: start_time() - Duration::minutes(25),
            },
        )
        .await?;

        let notified = Arc::new(AtomicUsize::new(0));
        let mut controller = load(&dir, &clock, counting_notifier(notified.clone())).await?;
        for _ in 0..3 {
            clock.advance(Duration::milliseconds(100));
            assert!(matches!(controller.tick().await, Tick::Stopped { .. }));
        }

        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(all_sessions(&dir).await?, 1);
        let task = controller.tasks().get(task.id).await?.unwrap();
        assert_eq!(task.completed_pomodoros, 1);
        assert_eq!(task.total_minutes_spent, 25);

        // The stored row now says "break, paused", so reloading again fires nothing.
        let row = Stores::open(dir.path())?
            .timer_state
            .fetch(DEFAULT_OWNER_ID)
            .await?
            .unwrap();
        assert_eq!(row.mode, TimerMode::Break);
        assert!(row.is_paused);
        assert_eq!(row.duration_left_seconds, Some(5 * 60));
        drop(controller);
        let _reloaded = load(&dir, &clock, MockNotifier::new()).await?;
        assert_eq!(all_sessions(&dir).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn completion_side_effects_once_per_completion() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        let notified = Arc::new(AtomicUsize::new(0));
        let mut controller = load(&dir, &clock, counting_notifier(notified.clone())).await?;
        let task = controller
            .tasks()
            .create(
                NewTask {
                    title: "read".into(),
                    estimated_pomodoros: 1,
                    ..Default::default()
                },
                start_time(),
            )
            .await?;
        controller.select_task(Some(task.id)).await;
        controller.start().await?;

        clock.advance(Duration::minutes(25));
        let mut completed = 0;
        for _ in 0..5 {
            if let Tick::Completed(_) = controller.tick().await {
                completed += 1;
            }
        }

        assert_eq!(completed, 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(all_sessions(&dir).await?, 1);
        let task = controller.tasks().get(task.id).await?.unwrap();
        assert_eq!(task.completed_pomodoros, 1);
        Ok(())
    }

    #[tokio::test]
    async fn pause_persists_remaining() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        let mut controller = load(&dir, &clock, MockNotifier::new()).await?;
        controller.start().await?;
        clock.advance(Duration::seconds(25 * 60 - 37));

        assert_eq!(controller.pause().await?, 37);

        let row = Stores::open(dir.path())?
            .timer_state
            .fetch(DEFAULT_OWNER_ID)
            .await?
            .unwrap();
        assert_eq!(row.duration_left_seconds, Some(37));
        assert_eq!(row.end_at, None);

        clock.advance(Duration::minutes(40));
        let mut reloaded = load(&dir, &clock, MockNotifier::new()).await?;
        assert_eq!(reloaded.remaining(), 37);
        reloaded.start().await?;
        let row = Stores::open(dir.path())?
            .timer_state
            .fetch(DEFAULT_OWNER_ID)
            .await?
            .unwrap();
        assert_eq!(row.end_at, Some(reloaded.now() + Duration::seconds(37)));
        Ok(())
    }

    #[tokio::test]
    async fn break_completion_records_nothing() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        let notified = Arc::new(AtomicUsize::new(0));
        let mut controller = load(&dir, &clock, counting_notifier(notified.clone())).await?;
        controller.skip().await;
        controller.start().await?;

        clock.advance(Duration::minutes(5));
        assert!(matches!(controller.tick().await, Tick::Completed(_)));

        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(all_sessions(&dir).await?, 0);
        assert_eq!(controller.timer().mode(), TimerMode::Focus);
        Ok(())
    }

    #[tokio::test]
    async fn remote_change_is_picked_up() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        let mut daemon = load(&dir, &clock, MockNotifier::new()).await?;
        daemon.start().await?;
        assert!(!daemon.sync_remote().await);

        clock.advance(Duration::seconds(10));
        let mut cli = load(&dir, &clock, MockNotifier::new()).await?;
        cli.pause().await?;

        assert!(daemon.sync_remote().await);
        assert!(!daemon.timer().state().is_running());
        assert_eq!(daemon.remaining(), 25 * 60 - 10);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_row_falls_back_to_defaults() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let stores = Stores::open(dir.path())?;
        drop(stores);
        std::fs::write(
            dir.path()
                .join("timer_state")
                .join(format!("{DEFAULT_OWNER_ID}.json")),
            "not json",
        )?;
        let clock = ManualClock::new(start_time());
        let controller = load(&dir, &clock, MockNotifier::new()).await?;
        assert_eq!(controller.timer().mode(), TimerMode::Focus);
        assert_eq!(controller.remaining(), 25 * 60);
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_does_not_repeat_completion() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        let task = Stores::open(dir.path())?
            .tasks
            .create(
                NewTask {
                    title: "refactor parser".into(),
                    estimated_pomodoros: 3,
                    ..Default::default()
                },
                start_time(),
            )
            .await?;
        seed_row(
            &dir,
            TimerSessionEntity {
                owner_id: DEFAULT_OWNER_ID,
                mode: TimerMode::Focus,
                end_at: Some(start_time() + Duration::seconds(60)),
                is_paused: false,
                duration_left_seconds: None,
                active_task_id: Some(task.id),
                updated_at: start_time() - Duration::minutes(24),
            },
        )
        .await?;

        let writable = Arc::new(AtomicBool::new(false));
        let notified = Arc::new(AtomicUsize::new(0));
        let mut controller = load_flaky(
            &dir,
            &clock,
            counting_notifier(notified.clone()),
            writable.clone(),
        )
        .await?;
        assert!(controller.timer().state().is_running());

        clock.advance(Duration::seconds(61));
        assert!(matches!(controller.tick().await, Tick::Completed(_)));
        for _ in 0..3 {
            clock.advance(Duration::seconds(1));
            assert!(!controller.sync_remote().await);
            assert!(matches!(controller.tick().await, Tick::Stopped { .. }));
        }

        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(all_sessions(&dir).await?, 1);
        let task = controller.tasks().get(task.id).await?.unwrap();
        assert_eq!(task.completed_pomodoros, 1);
        assert_eq!(controller.timer().mode(), TimerMode::Break);

        // The next sync retries the write once the store accepts it again.
        writable.store(true, Ordering::SeqCst);
        clock.advance(Duration::seconds(1));
        assert!(!controller.sync_remote().await);
        let row = Stores::open(dir.path())?
            .timer_state
            .fetch(DEFAULT_OWNER_ID)
            .await?
            .unwrap();
        assert_eq!(row.mode, TimerMode::Break);
        assert!(row.is_paused);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_keeps_local_change() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start_time());
        seed_row(
            &dir,
            TimerSessionEntity {
                owner_id: DEFAULT_OWNER_ID,
                mode: TimerMode::Focus,
                end_at: Some(start_time() + Duration::minutes(20)),
                is_paused: false,
                duration_left_seconds: None,
                active_task_id: None,
                updated_at: start_time() - Duration::minutes(5),
            },
        )
        .await?;

        let writable = Arc::new(AtomicBool::new(false));
        let mut daemon = load_flaky(&dir, &clock, MockNotifier::new(), writable).await?;
        clock.advance(Duration::seconds(10));
        daemon.stop().await;
        assert!(!daemon.timer().state().is_running());

        clock.advance(Duration::seconds(1));
        assert!(!daemon.sync_remote().await);
        assert!(!daemon.timer().state().is_running());
        assert_eq!(daemon.remaining(), 25 * 60);

        // A write made elsewhere after the unsaved stop still wins.
        clock.advance(Duration::seconds(5));
        let mut cli = load(&dir, &clock, MockNotifier::new()).await?;
        cli.skip().await;
        assert!(daemon.sync_remote().await);
        assert_eq!(daemon.timer().mode(), TimerMode::Break);
        Ok(())
    }
}
