use crate::domain::models::DayWindow;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_repository::TaskRepository;
use chrono::{DateTime, Utc};

/// A rollover happened when the anchor moved forward, or, on the first observation,
/// when incomplete tasks from earlier days are still around.
pub fn detect(
    last_anchor: Option<DateTime<Utc>>,
    current_anchor: DateTime<Utc>,
    stale_incomplete: usize,
) -> bool {
    match last_anchor {
        Some(last_anchor) => current_anchor > last_anchor,
        None => stale_incomplete > 0,
    }
}

/// Repository-backed detection. The stale-task scan only runs on the first observation.
pub async fn detect_rollover(
    repository: &dyn TaskRepository,
    last_anchor: Option<DateTime<Utc>>,
    today: &DayWindow,
) -> Result<bool, InfraError> {
    let stale_incomplete = match last_anchor {
        Some(_) => 0,
        None => repository.count_incomplete_before(today.start).await?,
    };
    Ok(detect(last_anchor, today.start, stale_incomplete))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Task;
    use crate::infrastructure::task_repository::InMemoryTaskRepository;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn tuesday() -> DayWindow {
        DayWindow {
            start: fixed_time("2026-02-17T00:00:00Z"),
            end: fixed_time("2026-02-18T00:00:00Z"),
        }
    }

    #[test]
    fn forward_anchor_is_a_rollover() {
        let monday = fixed_time("2026-02-16T00:00:00Z");
        let tuesday = fixed_time("2026-02-17T00:00:00Z");
        assert!(detect(Some(monday), tuesday, 0));
        assert!(!detect(Some(tuesday), tuesday, 5));
        assert!(!detect(Some(tuesday), monday, 0));
    }

    #[test]
    fn first_observation_needs_stale_work() {
        let tuesday = fixed_time("2026-02-17T00:00:00Z");
        assert!(detect(None, tuesday, 1));
        assert!(!detect(None, tuesday, 0));
    }

    #[tokio::test]
    async fn stale_completed_tasks_do_not_count() {
        let mut finished = Task::new("Done yesterday", fixed_time("2026-02-16T09:00:00Z"));
        finished.is_completed = true;
        let repository = InMemoryTaskRepository::with_tasks([finished]);
        assert!(!detect_rollover(&repository, None, &tuesday()).await.expect("detect"));

        repository
            .insert(&Task::new("Left open", fixed_time("2026-02-16T10:00:00Z")))
            .await
            .expect("insert");
        assert!(detect_rollover(&repository, None, &tuesday()).await.expect("detect"));
    }
}
