use crate::application::activity_sync::ExternalSyncBridge;
use crate::application::completion_buffer::{
    wait_for_settle, CompletionBuffer, SettledCallback, ToggleOutcome,
};
use crate::application::growth::GrowthTracker;
use crate::application::history::HistoryService;
use crate::application::rollover::detect_rollover;
use crate::application::widget::WidgetEntryBuilder;
use crate::domain::calendar::{system_now, DayCalendar, NowProvider};
use crate::domain::messages::{
    CelebrationProvider, EncouragementProvider, RotatingCelebration, RotatingEncouragement,
};
use crate::domain::models::{ActivityEndReason, Celebration, EncouragementMessage, Task, WidgetEntry};
use crate::domain::policy::{can_add, normalize_content};
use crate::infrastructure::config::AllCompletedPolicy;
use crate::infrastructure::display_surface::SurfaceCapability;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_store::SettingsStore;
use crate::infrastructure::task_repository::TaskRepository;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, MutexGuard};

const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_millis(1500);
const DEFAULT_SURFACE_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("empty content")]
    EmptyContent,
    #[error("limit reached")]
    LimitReached,
    #[error("completed task")]
    CompletedTask,
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error(transparent)]
    Repository(#[from] InfraError),
}

/// Read-only picture of the engine published to subscribers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineView {
    pub day_anchor: Option<DateTime<Utc>>,
    pub active_tasks: Vec<Task>,
    pub pending_completion_ids: Vec<String>,
    pub recently_completed_ids: Vec<String>,
    pub can_add_task: bool,
    pub limit_message: Option<EncouragementMessage>,
    pub celebration: Option<Celebration>,
    pub growth_points: u32,
    pub review_prompt_requested: bool,
    pub activity_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub rolled_over: bool,
    pub active_count: usize,
    pub celebration_started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionToggle {
    /// Completion is armed and lands after the delay.
    Pending,
    /// A pending completion was withdrawn.
    Cancelled,
}

enum CommitOutcome {
    Committed(Task),
    AlreadyCompleted,
    Missing,
}

#[derive(Debug)]
struct EngineState {
    day_anchor: Option<DateTime<Utc>>,
    active_tasks: Vec<Task>,
    buffer: CompletionBuffer,
    recently_completed: BTreeSet<String>,
    can_add_task: bool,
    limit_message: Option<EncouragementMessage>,
    celebration: Option<Celebration>,
    growth_points: u32,
    review_prompt_requested: bool,
    bridge: ExternalSyncBridge,
}

impl EngineState {
    fn clear_ephemeral(&mut self) {
        self.active_tasks.clear();
        self.recently_completed.clear();
        self.celebration = None;
        self.limit_message = None;
        let cancelled = self.buffer.cancel_all();
        if cancelled > 0 {
            debug!("event=pending_completions_cancelled count={cancelled}");
        }
    }

    fn view(&self) -> EngineView {
        EngineView {
            day_anchor: self.day_anchor,
            active_tasks: self.active_tasks.clone(),
            pending_completion_ids: self.buffer.pending_ids(),
            recently_completed_ids: self.recently_completed.iter().cloned().collect(),
            can_add_task: self.can_add_task,
            limit_message: self.limit_message.clone(),
            celebration: self.celebration.clone(),
            growth_points: self.growth_points,
            review_prompt_requested: self.review_prompt_requested,
            activity_running: self.bridge.is_running(),
        }
    }
}

struct EngineInner {
    repository: Arc<dyn TaskRepository>,
    calendar: DayCalendar,
    now_provider: NowProvider,
    encouragement: Arc<dyn EncouragementProvider>,
    celebrations: Arc<dyn CelebrationProvider>,
    growth: Option<GrowthTracker>,
    completion_delay: Duration,
    state: Mutex<EngineState>,
    view_tx: watch::Sender<EngineView>,
}

pub struct TaskEngineBuilder {
    repository: Arc<dyn TaskRepository>,
    calendar: DayCalendar,
    now_provider: NowProvider,
    capability: SurfaceCapability,
    all_completed_policy: AllCompletedPolicy,
    surface_timeout: Duration,
    completion_delay: Duration,
    encouragement: Arc<dyn EncouragementProvider>,
    celebrations: Arc<dyn CelebrationProvider>,
    settings: Option<Arc<dyn SettingsStore>>,
}

impl TaskEngineBuilder {
    pub fn with_calendar(mut self, calendar: DayCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_surface(mut self, capability: SurfaceCapability) -> Self {
        self.capability = capability;
        self
    }

    pub fn with_all_completed_policy(mut self, policy: AllCompletedPolicy) -> Self {
        self.all_completed_policy = policy;
        self
    }

    pub fn with_surface_timeout(mut self, surface_timeout: Duration) -> Self {
        self.surface_timeout = surface_timeout;
        self
    }

    pub fn with_completion_delay(mut self, completion_delay: Duration) -> Self {
        self.completion_delay = completion_delay;
        self
    }

    pub fn with_encouragement(mut self, encouragement: Arc<dyn EncouragementProvider>) -> Self {
        self.encouragement = encouragement;
        self
    }

    pub fn with_celebrations(mut self, celebrations: Arc<dyn CelebrationProvider>) -> Self {
        self.celebrations = celebrations;
        self
    }

    pub fn with_settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> TaskEngine {
        let growth = self.settings.map(GrowthTracker::new);
        let growth_points = match growth.as_ref().map(GrowthTracker::growth_points) {
            Some(Ok(points)) => points,
            Some(Err(error)) => {
                warn!("event=growth_load_failed error={error}");
                0
            }
            None => 0,
        };
        let bridge = ExternalSyncBridge::new(self.capability, self.all_completed_policy)
            .with_surface_timeout(self.surface_timeout);
        let state = EngineState {
            day_anchor: None,
            active_tasks: Vec::new(),
            buffer: CompletionBuffer::default(),
            recently_completed: BTreeSet::new(),
            can_add_task: true,
            limit_message: None,
            celebration: None,
            growth_points,
            review_prompt_requested: false,
            bridge,
        };
        let (view_tx, _) = watch::channel(state.view());

        TaskEngine {
            inner: Arc::new(EngineInner {
                repository: self.repository,
                calendar: self.calendar,
                now_provider: self.now_provider,
                encouragement: self.encouragement,
                celebrations: self.celebrations,
                growth,
                completion_delay: self.completion_delay,
                state: Mutex::new(state),
                view_tx,
            }),
        }
    }
}

/// Daily focus-task lifecycle. Clones share one engine; every operation is
/// serialized through the engine's state lock.
#[derive(Clone)]
pub struct TaskEngine {
    inner: Arc<EngineInner>,
}

impl TaskEngine {
    pub fn builder(repository: Arc<dyn TaskRepository>) -> TaskEngineBuilder {
        TaskEngineBuilder {
            repository,
            calendar: DayCalendar::default(),
            now_provider: system_now(),
            capability: SurfaceCapability::Absent,
            all_completed_policy: AllCompletedPolicy::End,
            surface_timeout: DEFAULT_SURFACE_TIMEOUT,
            completion_delay: DEFAULT_COMPLETION_DELAY,
            encouragement: Arc::new(RotatingEncouragement::default()),
            celebrations: Arc::new(RotatingCelebration::default()),
            settings: None,
        }
    }

    pub fn calendar(&self) -> DayCalendar {
        self.inner.calendar
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.inner.now_provider)()
    }

    pub fn view(&self) -> EngineView {
        self.inner.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.inner.view_tx.subscribe()
    }

    pub fn history(&self) -> HistoryService {
        HistoryService::new(self.inner.repository.clone(), self.inner.calendar)
    }

    pub async fn refresh(&self, reference: DateTime<Utc>) -> Result<RefreshReport, EngineError> {
        let mut state = self.inner.lock_state().await;
        let report = self.inner.refresh_locked(&mut state, reference).await;
        self.inner.publish(&state);
        report
    }

    /// Persists a new task for the current day. The caller refreshes afterwards.
    pub async fn add_task(&self, content: &str) -> Result<Task, EngineError> {
        let content = normalize_content(content).ok_or(EngineError::EmptyContent)?;
        let _state = self.inner.lock_state().await;
        let now = self.now();
        let today = self.inner.calendar.day_window(now);

        let count_today = self.inner.repository.count_in_day(&today).await?;
        if !can_add(count_today) {
            debug!("event=task_rejected reason=limit_reached count_today={count_today}");
            return Err(EngineError::LimitReached);
        }

        let task = Task::new(content, now);
        self.inner.repository.insert(&task).await?;
        info!("event=task_added task_id={} count_today={}", task.id, count_today + 1);
        Ok(task)
    }

    /// Replaces the content of an open task. The caller refreshes afterwards.
    pub async fn edit_task(&self, task: &Task, new_content: &str) -> Result<Task, EngineError> {
        if task.is_completed {
            return Err(EngineError::CompletedTask);
        }
        let content = normalize_content(new_content).ok_or(EngineError::EmptyContent)?;
        let _state = self.inner.lock_state().await;

        let mut current = self
            .inner
            .repository
            .fetch_by_id(&task.id)
            .await?
            .ok_or_else(|| EngineError::TaskNotFound(task.id.clone()))?;
        if current.is_completed {
            return Err(EngineError::CompletedTask);
        }
        current.content = content;
        self.inner.repository.update(&current).await?;
        info!("event=task_edited task_id={}", current.id);
        Ok(current)
    }

    /// Arms a delayed completion for `task`, or withdraws the one already pending.
    pub async fn toggle_completion(
        &self,
        task: &Task,
        on_settled: Option<SettledCallback>,
    ) -> Result<CompletionToggle, EngineError> {
        let mut state = self.inner.lock_state().await;
        if !state.buffer.is_pending(&task.id) {
            let current = self
                .inner
                .repository
                .fetch_by_id(&task.id)
                .await?
                .ok_or_else(|| EngineError::TaskNotFound(task.id.clone()))?;
            if current.is_completed {
                return Err(EngineError::CompletedTask);
            }
        }

        let outcome = match state.buffer.toggle(&task.id, on_settled) {
            ToggleOutcome::Started { token, generation } => {
                let engine = Arc::downgrade(&self.inner);
                let delay = self.inner.completion_delay;
                let task_id = task.id.clone();
                tokio::spawn(async move {
                    if !wait_for_settle(token, delay).await {
                        debug!("event=completion_cancelled task_id={task_id}");
                        return;
                    }
                    settle_if_alive(engine, &task_id, generation).await;
                });
                debug!("event=completion_pending task_id={} generation={generation}", task.id);
                CompletionToggle::Pending
            }
            ToggleOutcome::Cancelled => {
                state.recently_completed.remove(&task.id);
                debug!("event=completion_undone task_id={}", task.id);
                CompletionToggle::Cancelled
            }
        };
        self.inner.publish(&state);
        Ok(outcome)
    }

    /// Deletes every task of the reference day and starts the day over.
    pub async fn reset_today(&self, reference: DateTime<Utc>) -> Result<RefreshReport, EngineError> {
        let mut state = self.inner.lock_state().await;
        let today = self.inner.calendar.day_window(reference);

        let removed = self.inner.repository.delete_all_in_day(&today).await?;
        state.clear_ephemeral();
        state.day_anchor = Some(today.start);
        state.bridge.end_activity(ActivityEndReason::ManualReset).await;
        info!("event=day_reset anchor={} removed={removed}", today.start.to_rfc3339());

        let report = self.inner.refresh_locked(&mut state, reference).await;
        self.inner.publish(&state);
        report
    }

    pub async fn dismiss_celebration(&self) {
        let mut state = self.inner.lock_state().await;
        state.celebration = None;
        self.inner.publish(&state);
    }

    pub async fn clear_completion_marker(&self, task_id: &str) {
        let mut state = self.inner.lock_state().await;
        if state.recently_completed.remove(task_id) {
            self.inner.publish(&state);
        }
    }

    pub async fn acknowledge_review_prompt(&self) {
        let mut state = self.inner.lock_state().await;
        state.review_prompt_requested = false;
        self.inner.publish(&state);
    }

    pub async fn widget_entry(&self, reference: DateTime<Utc>) -> Result<WidgetEntry, EngineError> {
        let today = self.inner.calendar.day_window(reference);
        let tasks = self.inner.repository.fetch_all_in_day(&today).await?;
        let builder = WidgetEntryBuilder::new(self.inner.calendar, self.inner.encouragement.clone());
        Ok(builder.build_entry(reference, &tasks))
    }
}

async fn settle_if_alive(engine: Weak<EngineInner>, task_id: &str, generation: u64) {
    match engine.upgrade() {
        Some(inner) => inner.settle(task_id, generation).await,
        None => debug!("event=completion_dropped task_id={task_id} reason=engine_gone"),
    }
}

impl EngineInner {
    async fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().await
    }

    fn publish(&self, state: &EngineState) {
        self.view_tx.send_replace(state.view());
    }

    async fn refresh_locked(
        &self,
        state: &mut EngineState,
        reference: DateTime<Utc>,
    ) -> Result<RefreshReport, EngineError> {
        let today = self.calendar.day_window(reference);

        let rolled_over = detect_rollover(self.repository.as_ref(), state.day_anchor, &today).await?;
        if rolled_over {
            state.clear_ephemeral();
            state.bridge.end_activity(ActivityEndReason::DayRolledOver).await;
            info!("event=day_rolled_over anchor={}", today.start.to_rfc3339());
        }
        state.day_anchor = Some(today.start);

        let active = self.repository.fetch_incomplete_in_day(&today).await?;
        let celebration_started = !state.active_tasks.is_empty() && active.is_empty();
        if celebration_started {
            state.celebration = Some(self.celebrations.next_celebration());
            info!("event=celebration_started");
        }
        state.active_tasks = active;

        let live_ids = state
            .active_tasks
            .iter()
            .map(|task| task.id.clone())
            .collect::<HashSet<_>>();
        state.recently_completed.retain(|task_id| live_ids.contains(task_id));
        state.buffer.retain_ids(&live_ids);

        let count_today = self.repository.count_in_day(&today).await?;
        state.can_add_task = can_add(count_today);
        if state.can_add_task {
            state.limit_message = None;
        } else if state.limit_message.is_none() {
            state.limit_message = Some(self.encouragement.next_message());
        }

        match self.repository.fetch_all_in_day(&today).await {
            Ok(day_tasks) => state.bridge.handle_tasks_changed(&day_tasks).await,
            Err(error) => warn!("event=activity_sync_skipped error={error}"),
        }

        Ok(RefreshReport {
            rolled_over,
            active_count: state.active_tasks.len(),
            celebration_started,
        })
    }

    async fn settle(&self, task_id: &str, generation: u64) {
        let (task, on_settled) = {
            let mut state = self.lock_state().await;
            let Some(record) = state.buffer.take_if_current(task_id, generation) else {
                debug!("event=completion_superseded task_id={task_id} generation={generation}");
                return;
            };
            let committed = match self.commit_completion(task_id).await {
                Ok(CommitOutcome::Committed(task)) => {
                    state.recently_completed.insert(task.id.clone());
                    info!("event=task_completed task_id={task_id}");
                    Some(task)
                }
                Ok(CommitOutcome::AlreadyCompleted) => {
                    debug!("event=completion_skipped task_id={task_id} reason=already_completed");
                    None
                }
                Ok(CommitOutcome::Missing) => {
                    debug!("event=completion_skipped task_id={task_id} reason=task_missing");
                    None
                }
                Err(error) => {
                    error!("event=completion_failed task_id={task_id} error={error}");
                    None
                }
            };
            self.publish(&state);
            match committed {
                Some(task) => (task, record.into_callback()),
                None => return,
            }
        };

        if let Some(on_settled) = on_settled {
            on_settled(&task);
        }

        let now = (self.now_provider)();
        let mut state = self.lock_state().await;
        self.register_growth(&mut state, now).await;
        if let Err(error) = self.refresh_locked(&mut state, now).await {
            warn!("event=refresh_after_completion_failed task_id={task_id} error={error}");
        }
        self.publish(&state);
    }

    async fn commit_completion(&self, task_id: &str) -> Result<CommitOutcome, InfraError> {
        let Some(mut task) = self.repository.fetch_by_id(task_id).await? else {
            return Ok(CommitOutcome::Missing);
        };
        if task.is_completed {
            return Ok(CommitOutcome::AlreadyCompleted);
        }
        task.is_completed = true;
        self.repository.update(&task).await?;
        Ok(CommitOutcome::Committed(task))
    }

    async fn register_growth(&self, state: &mut EngineState, now: DateTime<Utc>) {
        let Some(growth) = self.growth.as_ref() else {
            return;
        };
        let today = self.calendar.day_window(now);
        let date = self.calendar.local_date(now);
        match growth.evaluate(self.repository.as_ref(), &today, date).await {
            Ok(Some(change)) => {
                state.growth_points = change.current;
                if change.review_prompt {
                    state.review_prompt_requested = true;
                }
            }
            Ok(None) => {}
            Err(error) => warn!("event=growth_failed error={error}"),
        }
    }
}
