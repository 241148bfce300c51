use crate::domain::models::{DayWindow, Task};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_repository::TaskRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const TASK_COLUMNS: &str = "id, content, created_at_ms, is_completed";

type TaskRow = (String, String, i64, bool);

#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    db_path: PathBuf,
}

impl SqliteTaskRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    async fn run<T, F>(&self, operation: F) -> Result<T, InfraError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, InfraError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let connection = Connection::open(&db_path)?;
            operation(&connection)
        })
        .await
        .map_err(|error| InfraError::Join(format!("sqlite task repository worker failed: {error}")))?
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_task((id, content, created_at_ms, is_completed): TaskRow) -> Result<Task, InfraError> {
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_at_ms).ok_or_else(|| {
        InfraError::InvalidData(format!(
            "invalid tasks.created_at_ms '{created_at_ms}' for task {id}"
        ))
    })?;
    Ok(Task {
        id,
        content,
        created_at,
        is_completed,
    })
}

fn query_tasks(
    connection: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Task>, InfraError> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement
        .query_map(params, read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_task).collect()
}

fn count(connection: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<usize, InfraError> {
    let value: i64 = connection.query_row(sql, params, |row| row.get(0))?;
    usize::try_from(value)
        .map_err(|error| InfraError::InvalidData(format!("invalid task count {value}: {error}")))
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert(&self, task: &Task) -> Result<(), InfraError> {
        task.validate().map_err(InfraError::InvalidData)?;
        let task = task.clone();
        self.run(move |connection| {
            connection.execute(
                "INSERT INTO tasks (id, content, created_at_ms, is_completed) VALUES (?1, ?2, ?3, ?4)",
                params![
                    task.id,
                    task.content,
                    task.created_at.timestamp_millis(),
                    task.is_completed
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task) -> Result<(), InfraError> {
        task.validate().map_err(InfraError::InvalidData)?;
        let task = task.clone();
        self.run(move |connection| {
            let changed = connection.execute(
                "UPDATE tasks SET content = ?2, is_completed = ?3 WHERE id = ?1",
                params![task.id, task.content, task.is_completed],
            )?;
            if changed == 0 {
                return Err(InfraError::InvalidData(format!("task not found: {}", task.id)));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, task_id: &str) -> Result<(), InfraError> {
        let task_id = task_id.to_string();
        self.run(move |connection| {
            connection.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(())
        })
        .await
    }

    async fn count_in_day(&self, day: &DayWindow) -> Result<usize, InfraError> {
        let (start, end) = (day.start.timestamp_millis(), day.end.timestamp_millis());
        self.run(move |connection| {
            count(
                connection,
                "SELECT COUNT(*) FROM tasks WHERE created_at_ms >= ?1 AND created_at_ms < ?2",
                params![start, end],
            )
        })
        .await
    }

    async fn count_incomplete_before(&self, before: DateTime<Utc>) -> Result<usize, InfraError> {
        let before = before.timestamp_millis();
        self.run(move |connection| {
            count(
                connection,
                "SELECT COUNT(*) FROM tasks WHERE is_completed = 0 AND created_at_ms < ?1",
                params![before],
            )
        })
        .await
    }

    async fn fetch_incomplete_in_day(&self, day: &DayWindow) -> Result<Vec<Task>, InfraError> {
        let (start, end) = (day.start.timestamp_millis(), day.end.timestamp_millis());
        self.run(move |connection| {
            query_tasks(
                connection,
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE is_completed = 0 AND created_at_ms >= ?1 AND created_at_ms < ?2
                     ORDER BY created_at_ms ASC, id ASC"
                ),
                params![start, end],
            )
        })
        .await
    }

    async fn fetch_all_in_day(&self, day: &DayWindow) -> Result<Vec<Task>, InfraError> {
        let (start, end) = (day.start.timestamp_millis(), day.end.timestamp_millis());
        self.run(move |connection| {
            query_tasks(
                connection,
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE created_at_ms >= ?1 AND created_at_ms < ?2
                     ORDER BY created_at_ms ASC, id ASC"
                ),
                params![start, end],
            )
        })
        .await
    }

    async fn fetch_completed(&self) -> Result<Vec<Task>, InfraError> {
        self.run(|connection| {
            query_tasks(
                connection,
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE is_completed = 1
                     ORDER BY created_at_ms DESC, id DESC"
                ),
                params![],
            )
        })
        .await
    }

    async fn fetch_by_id(&self, task_id: &str) -> Result<Option<Task>, InfraError> {
        let task_id = task_id.to_string();
        self.run(move |connection| {
            let row = connection
                .query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    params![task_id],
                    read_row,
                )
                .optional()?;
            row.map(into_task).transpose()
        })
        .await
    }

    async fn delete_all_in_day(&self, day: &DayWindow) -> Result<usize, InfraError> {
        let (start, end) = (day.start.timestamp_millis(), day.end.timestamp_millis());
        self.run(move |connection| {
            let removed = connection.execute(
                "DELETE FROM tasks WHERE created_at_ms >= ?1 AND created_at_ms < ?2",
                params![start, end],
            )?;
            Ok(removed)
        })
        .await
    }
}
