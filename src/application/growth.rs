use crate::domain::models::DayWindow;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_store::SettingsStore;
use crate::infrastructure::task_repository::TaskRepository;
use chrono::NaiveDate;
use log::info;
use std::sync::Arc;

pub const REVIEW_THRESHOLDS: [u32; 5] = [3, 8, 16, 31, 51];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthChange {
    pub previous: u32,
    pub current: u32,
    /// Set the one time a review prompt should be shown.
    pub review_prompt: bool,
}

/// One growth point for every day on which all focus tasks were finished.
#[derive(Clone)]
pub struct GrowthTracker {
    store: Arc<dyn SettingsStore>,
}

impl GrowthTracker {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn growth_points(&self) -> Result<u32, InfraError> {
        Ok(self.store.load()?.growth_points)
    }

    pub fn register_growth_if_needed(&self, today: NaiveDate) -> Result<Option<GrowthChange>, InfraError> {
        let mut state = self.store.load()?;
        if state.last_growth_date == Some(today) {
            return Ok(None);
        }

        let previous = state.growth_points;
        let current = previous.saturating_add(1);
        let crossed = REVIEW_THRESHOLDS
            .iter()
            .any(|threshold| previous < *threshold && current >= *threshold);
        let review_prompt = crossed && !state.has_attempted_review_request;

        state.growth_points = current;
        state.last_growth_date = Some(today);
        if review_prompt {
            state.has_attempted_review_request = true;
        }
        self.store.save(&state)?;

        info!("event=growth_registered previous={previous} current={current} review_prompt={review_prompt}");
        Ok(Some(GrowthChange {
            previous,
            current,
            review_prompt,
        }))
    }

    /// Registers growth when `today` has tasks and all of them are completed.
    pub async fn evaluate(
        &self,
        repository: &dyn TaskRepository,
        today: &DayWindow,
        date: NaiveDate,
    ) -> Result<Option<GrowthChange>, InfraError> {
        let tasks = repository.fetch_all_in_day(today).await?;
        if tasks.is_empty() || !tasks.iter().all(|task| task.is_completed) {
            return Ok(None);
        }
        self.register_growth_if_needed(date)
    }
}
