use crate::domain::calendar::DayCalendar;
use crate::domain::messages::EncouragementProvider;
use crate::domain::models::{Task, WidgetEntry, WidgetState, WidgetTask};
use crate::domain::policy::DAILY_LIMIT;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct WidgetEntryBuilder {
    calendar: DayCalendar,
    encouragement: Arc<dyn EncouragementProvider>,
}

impl WidgetEntryBuilder {
    pub fn new(calendar: DayCalendar, encouragement: Arc<dyn EncouragementProvider>) -> Self {
        Self {
            calendar,
            encouragement,
        }
    }

    /// Today's open tasks, oldest first and capped at the daily limit,
    /// or an encouragement when nothing is left.
    pub fn build_entry(&self, reference: DateTime<Utc>, tasks: &[Task]) -> WidgetEntry {
        let mut open = tasks
            .iter()
            .filter(|task| !task.is_completed && self.calendar.is_same_day(task.created_at, reference))
            .collect::<Vec<_>>();
        open.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });

        let state = if open.is_empty() {
            WidgetState::Empty(self.encouragement.next_message())
        } else {
            WidgetState::Tasks(
                open.into_iter()
                    .take(DAILY_LIMIT)
                    .map(|task| WidgetTask {
                        id: task.id.clone(),
                        content: task.content.clone(),
                    })
                    .collect(),
            )
        };
        WidgetEntry {
            date: reference,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::RotatingEncouragement;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn builder() -> WidgetEntryBuilder {
        WidgetEntryBuilder::new(DayCalendar::default(), Arc::new(RotatingEncouragement::default()))
    }

    #[test]
    fn entry_lists_todays_open_tasks_in_creation_order() {
        let mut done = Task::new("Done", fixed_time("2026-02-16T07:00:00Z"));
        done.is_completed = true;
        let tasks = vec![
            Task::new("Review PR", fixed_time("2026-02-16T11:00:00Z")),
            Task::new("Write report", fixed_time("2026-02-16T09:00:00Z")),
            Task::new("Yesterday", fixed_time("2026-02-15T09:00:00Z")),
            done,
        ];

        let entry = builder().build_entry(fixed_time("2026-02-16T12:00:00Z"), &tasks);
        let WidgetState::Tasks(visible) = entry.state else {
            panic!("expected task list");
        };
        let contents = visible.iter().map(|task| task.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["Write report", "Review PR"]);
    }

    #[test]
    fn entry_falls_back_to_encouragement() {
        let entry = builder().build_entry(fixed_time("2026-02-16T12:00:00Z"), &[]);
        assert!(matches!(entry.state, WidgetState::Empty(_)));
        assert_eq!(entry.date, fixed_time("2026-02-16T12:00:00Z"));
    }
}
