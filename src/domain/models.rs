use crate::domain::policy::MAX_CONTENT_CHARS;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_completed: bool,
}

impl Task {
    pub fn new(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            created_at,
            is_completed: false,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.content, "task.content")?;
        if self.content.trim() != self.content {
            return Err("task.content must be trimmed".to_string());
        }
        if self.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(format!(
                "task.content must be at most {MAX_CONTENT_CHARS} characters"
            ));
        }
        Ok(())
    }
}

/// Half-open `[start, end)` interval covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEndReason {
    Completed,
    ManualReset,
    DayRolledOver,
}

impl ActivityEndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::ManualReset => "manual_reset",
            Self::DayRolledOver => "day_rolled_over",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayTask {
    pub id: String,
    pub content: String,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplaySnapshot {
    pub tasks: Vec<DisplayTask>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub remaining_tasks: usize,
    pub progress: f64,
    pub status_message: String,
}

impl DisplaySnapshot {
    pub fn validate(&self) -> Result<(), String> {
        if self.completed_tasks + self.remaining_tasks != self.total_tasks {
            return Err("snapshot.completed + snapshot.remaining must equal snapshot.total".to_string());
        }
        if !(0.0..=1.0).contains(&self.progress) {
            return Err("snapshot.progress must be within 0..=1".to_string());
        }
        validate_non_empty(&self.status_message, "snapshot.status_message")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncouragementMessage {
    pub message: String,
    pub encouragement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Celebration {
    pub id: String,
    pub title: String,
    pub quote: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistorySection {
    pub day: NaiveDate,
    pub title: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetTask {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WidgetState {
    Tasks(Vec<WidgetTask>),
    Empty(EncouragementMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetEntry {
    pub date: DateTime<Utc>,
    pub state: WidgetState,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
