use crate::domain::models::{DayWindow, Task};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<(), InfraError>;
    async fn update(&self, task: &Task) -> Result<(), InfraError>;
    async fn delete(&self, task_id: &str) -> Result<(), InfraError>;
    async fn count_in_day(&self, day: &DayWindow) -> Result<usize, InfraError>;
    async fn count_incomplete_before(&self, before: DateTime<Utc>) -> Result<usize, InfraError>;
    /// Incomplete tasks of `day`, oldest first.
    async fn fetch_incomplete_in_day(&self, day: &DayWindow) -> Result<Vec<Task>, InfraError>;
    /// Every task of `day`, oldest first.
    async fn fetch_all_in_day(&self, day: &DayWindow) -> Result<Vec<Task>, InfraError>;
    /// Completed tasks of every day, newest first.
    async fn fetch_completed(&self) -> Result<Vec<Task>, InfraError>;
    async fn fetch_by_id(&self, task_id: &str) -> Result<Option<Task>, InfraError>;
    async fn delete_all_in_day(&self, day: &DayWindow) -> Result<usize, InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: Mutex::new(
                tasks
                    .into_iter()
                    .map(|task| (task.id.clone(), task))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Task>>, InfraError> {
        self.tasks
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("task repository lock poisoned: {error}")))
    }

    fn collect_sorted<F>(&self, filter: F) -> Result<Vec<Task>, InfraError>
    where
        F: Fn(&Task) -> bool,
    {
        let tasks = self.lock()?;
        let mut matching = tasks
            .values()
            .filter(|task| filter(task))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(matching)
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> Result<(), InfraError> {
        task.validate().map_err(InfraError::InvalidData)?;
        let mut tasks = self.lock()?;
        if tasks.contains_key(&task.id) {
            return Err(InfraError::InvalidData(format!(
                "task already exists: {}",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> Result<(), InfraError> {
        task.validate().map_err(InfraError::InvalidData)?;
        let mut tasks = self.lock()?;
        let Some(existing) = tasks.get_mut(&task.id) else {
            return Err(InfraError::InvalidData(format!("task not found: {}", task.id)));
        };
        *existing = task.clone();
        Ok(())
    }

    async fn delete(&self, task_id: &str) -> Result<(), InfraError> {
        self.lock()?.remove(task_id);
        Ok(())
    }

    async fn count_in_day(&self, day: &DayWindow) -> Result<usize, InfraError> {
        let tasks = self.lock()?;
        Ok(tasks.values().filter(|task| day.contains(task.created_at)).count())
    }

    async fn count_incomplete_before(&self, before: DateTime<Utc>) -> Result<usize, InfraError> {
        let tasks = self.lock()?;
        Ok(tasks
            .values()
            .filter(|task| !task.is_completed && task.created_at < before)
            .count())
    }

    async fn fetch_incomplete_in_day(&self, day: &DayWindow) -> Result<Vec<Task>, InfraError> {
        self.collect_sorted(|task| !task.is_completed && day.contains(task.created_at))
    }

    async fn fetch_all_in_day(&self, day: &DayWindow) -> Result<Vec<Task>, InfraError> {
        self.collect_sorted(|task| day.contains(task.created_at))
    }

    async fn fetch_completed(&self) -> Result<Vec<Task>, InfraError> {
        let mut completed = self.collect_sorted(|task| task.is_completed)?;
        completed.reverse();
        Ok(completed)
    }

    async fn fetch_by_id(&self, task_id: &str) -> Result<Option<Task>, InfraError> {
        Ok(self.lock()?.get(task_id).cloned())
    }

    async fn delete_all_in_day(&self, day: &DayWindow) -> Result<usize, InfraError> {
        let mut tasks = self.lock()?;
        let before = tasks.len();
        tasks.retain(|_, task| !day.contains(task.created_at));
        Ok(before - tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn monday() -> DayWindow {
        DayWindow {
            start: fixed_time("2026-02-16T00:00:00Z"),
            end: fixed_time("2026-02-17T00:00:00Z"),
        }
    }

    fn task(content: &str, created_at: &str, is_completed: bool) -> Task {
        let mut task = Task::new(content, fixed_time(created_at));
        task.is_completed = is_completed;
        task
    }

    #[tokio::test]
    async fn day_queries_respect_window_and_order() {
        let repository = InMemoryTaskRepository::with_tasks([
            task("Review PR", "2026-02-16T11:00:00Z", false),
            task("Write report", "2026-02-16T09:00:00Z", false),
            task("Call client", "2026-02-16T10:00:00Z", true),
            task("Yesterday", "2026-02-15T22:00:00Z", false),
            task("Tomorrow", "2026-02-17T00:00:00Z", false),
        ]);

        let incomplete = repository
            .fetch_incomplete_in_day(&monday())
            .await
            .expect("fetch incomplete");
        let contents = incomplete.iter().map(|task| task.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["Write report", "Review PR"]);

        let all = repository.fetch_all_in_day(&monday()).await.expect("fetch all");
        assert_eq!(all.len(), 3);
        assert_eq!(repository.count_in_day(&monday()).await.expect("count"), 3);
        assert_eq!(
            repository
                .count_incomplete_before(monday().start)
                .await
                .expect("count stale"),
            1
        );
    }

    #[tokio::test]
    async fn fetch_completed_is_newest_first() {
        let repository = InMemoryTaskRepository::with_tasks([
            task("Old", "2026-02-14T09:00:00Z", true),
            task("New", "2026-02-16T09:00:00Z", true),
            task("Open", "2026-02-16T10:00:00Z", false),
        ]);

        let completed = repository.fetch_completed().await.expect("fetch completed");
        let contents = completed.iter().map(|task| task.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn insert_rejects_invalid_and_duplicate_tasks() {
        let repository = InMemoryTaskRepository::default();
        let valid = task("Write report", "2026-02-16T09:00:00Z", false);
        repository.insert(&valid).await.expect("insert valid");
        assert!(repository.insert(&valid).await.is_err());

        let blank = task("  ", "2026-02-16T09:00:00Z", false);
        assert!(repository.insert(&blank).await.is_err());
    }

    #[tokio::test]
    async fn update_and_delete_all_in_day() {
        let mut target = task("Write report", "2026-02-16T09:00:00Z", false);
        let other_day = task("Yesterday", "2026-02-15T09:00:00Z", false);
        let repository = InMemoryTaskRepository::with_tasks([target.clone(), other_day.clone()]);

        target.is_completed = true;
        repository.update(&target).await.expect("update");
        let loaded = repository
            .fetch_by_id(&target.id)
            .await
            .expect("fetch by id")
            .expect("task exists");
        assert!(loaded.is_completed);

        let removed = repository.delete_all_in_day(&monday()).await.expect("delete day");
        assert_eq!(removed, 1);
        assert!(repository.fetch_by_id(&target.id).await.expect("fetch").is_none());
        assert!(repository.fetch_by_id(&other_day.id).await.expect("fetch").is_some());

        repository.delete(&other_day.id).await.expect("delete");
        assert!(repository.fetch_by_id(&other_day.id).await.expect("fetch").is_none());
        assert!(repository.update(&other_day).await.is_err());
    }
}
