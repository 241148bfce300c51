use crate::domain::calendar::DayCalendar;
use crate::domain::models::{HistorySection, Task};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_repository::TaskRepository;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

const TITLE_FORMAT: &str = "%Y-%m-%d";

/// Completed tasks grouped by local day, newest day first.
#[derive(Clone)]
pub struct HistoryService {
    repository: Arc<dyn TaskRepository>,
    calendar: DayCalendar,
}

impl HistoryService {
    pub fn new(repository: Arc<dyn TaskRepository>, calendar: DayCalendar) -> Self {
        Self {
            repository,
            calendar,
        }
    }

    pub async fn load_history(&self) -> Result<Vec<HistorySection>, InfraError> {
        let completed = self.repository.fetch_completed().await?;
        Ok(group_by_day(&self.calendar, completed))
    }

    /// Every task created on the local `date`, open or completed, oldest first.
    pub async fn tasks_on(&self, date: NaiveDate) -> Result<Vec<Task>, InfraError> {
        self.repository
            .fetch_all_in_day(&self.calendar.window_of_date(date))
            .await
    }
}

pub fn group_by_day(calendar: &DayCalendar, tasks: Vec<Task>) -> Vec<HistorySection> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        grouped
            .entry(calendar.local_date(task.created_at))
            .or_default()
            .push(task);
    }

    grouped
        .into_iter()
        .rev()
        .map(|(day, mut tasks)| {
            tasks.sort_by(|left, right| {
                left.created_at
                    .cmp(&right.created_at)
                    .then_with(|| left.id.cmp(&right.id))
            });
            HistorySection {
                day,
                title: day.format(TITLE_FORMAT).to_string(),
                tasks,
            }
        })
        .collect()
}

pub fn count_description(section: &HistorySection) -> String {
    format!("{} completed", section.tasks.len())
}
