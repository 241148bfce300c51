use crate::domain::models::{ActivityEndReason, DisplaySnapshot};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Glanceable always-visible surface that mirrors today's progress.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    async fn start(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError>;
    async fn update(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError>;
    async fn end(&self, reason: ActivityEndReason) -> Result<(), InfraError>;
}

/// Display capability, resolved once when the engine is wired.
#[derive(Clone)]
pub enum SurfaceCapability {
    Present(Arc<dyn DisplaySurface>),
    Absent,
}

impl SurfaceCapability {
    pub fn resolve(enabled: bool, surface: Arc<dyn DisplaySurface>) -> Self {
        if enabled {
            Self::Present(surface)
        } else {
            Self::Absent
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl fmt::Debug for SurfaceCapability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(_) => formatter.write_str("SurfaceCapability::Present"),
            Self::Absent => formatter.write_str("SurfaceCapability::Absent"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActivityRecord {
    Running {
        snapshot: DisplaySnapshot,
        #[serde(rename = "updatedAt")]
        updated_at: DateTime<Utc>,
    },
    Ended {
        reason: ActivityEndReason,
        #[serde(rename = "endedAt")]
        ended_at: DateTime<Utc>,
    },
}

/// Writes the latest activity state to a JSON file that a widget process polls.
#[derive(Debug, Clone)]
pub struct JsonFileDisplaySurface {
    path: PathBuf,
}

impl JsonFileDisplaySurface {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn read_record(&self) -> Result<Option<ActivityRecord>, InfraError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn persist(&self, record: ActivityRecord) -> Result<(), InfraError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_record(&path, &record))
            .await
            .map_err(|error| InfraError::Join(format!("activity file writer failed: {error}")))?
    }

    async fn write_snapshot(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError> {
        snapshot.validate().map_err(InfraError::Surface)?;
        self.persist(ActivityRecord::Running {
            snapshot: snapshot.clone(),
            updated_at: Utc::now(),
        })
        .await
    }
}

/// Replaces the file through a staging copy so readers never see a partial write.
fn write_record(path: &Path, record: &ActivityRecord) -> Result<(), InfraError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let formatted = serde_json::to_string_pretty(record)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, format!("{formatted}\n"))?;
    fs::rename(&staging, path)?;
    Ok(())
}

#[async_trait]
impl DisplaySurface for JsonFileDisplaySurface {
    async fn start(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError> {
        self.write_snapshot(snapshot).await
    }

    async fn update(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError> {
        self.write_snapshot(snapshot).await
    }

    async fn end(&self, reason: ActivityEndReason) -> Result<(), InfraError> {
        self.persist(ActivityRecord::Ended {
            reason,
            ended_at: Utc::now(),
        })
        .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Start(DisplaySnapshot),
    Update(DisplaySnapshot),
    End(ActivityEndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFailure {
    Disabled,
    Unsupported,
    Failed,
}

impl SurfaceFailure {
    fn to_error(self) -> InfraError {
        match self {
            Self::Disabled => InfraError::SurfaceDisabled,
            Self::Unsupported => InfraError::SurfaceUnsupported,
            Self::Failed => InfraError::Surface("recording surface configured to fail".to_string()),
        }
    }
}

/// In-process surface that keeps the calls it accepted, in order.
#[derive(Debug, Default)]
pub struct RecordingDisplaySurface {
    calls: Mutex<Vec<SurfaceCall>>,
    failure: Mutex<Option<SurfaceFailure>>,
    latency: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl RecordingDisplaySurface {
    /// Subsequent start/update calls fail with `failure`; `None` restores success.
    pub fn fail_with(&self, failure: Option<SurfaceFailure>) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = failure;
        }
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.lock_calls().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::Start(_)))
            .count()
    }

    pub fn end_reasons(&self) -> Vec<ActivityEndReason> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SurfaceCall::End(reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    fn lock_calls(&self) -> Result<MutexGuard<'_, Vec<SurfaceCall>>, InfraError> {
        self.calls
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("recording surface lock poisoned: {error}")))
    }

    async fn accept(&self, call: SurfaceCall, may_fail: bool) -> Result<(), InfraError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if may_fail {
            let failure = self.failure.lock().ok().and_then(|guard| *guard);
            if let Some(failure) = failure {
                return Err(failure.to_error());
            }
        }
        self.lock_calls()?.push(call);
        Ok(())
    }
}

#[async_trait]
impl DisplaySurface for RecordingDisplaySurface {
    async fn start(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError> {
        self.accept(SurfaceCall::Start(snapshot.clone()), true).await
    }

    async fn update(&self, snapshot: &DisplaySnapshot) -> Result<(), InfraError> {
        self.accept(SurfaceCall::Update(snapshot.clone()), true).await
    }

    async fn end(&self, reason: ActivityEndReason) -> Result<(), InfraError> {
        self.accept(SurfaceCall::End(reason), false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DisplayTask;

    fn snapshot(completed: usize, total: usize) -> DisplaySnapshot {
        DisplaySnapshot {
            tasks: (0..total)
                .map(|index| DisplayTask {
                    id: format!("tsk-{index}"),
                    content: format!("Task {index}"),
                    is_completed: index < completed,
                })
                .collect(),
            total_tasks: total,
            completed_tasks: completed,
            remaining_tasks: total - completed,
            progress: completed as f64 / total as f64,
            status_message: format!("{completed}/{total} focus tasks done"),
        }
    }

    #[tokio::test]
    async fn json_file_surface_keeps_last_write() {
        let dir = tempfile::tempdir().expect("temp dir");
        let surface = JsonFileDisplaySurface::new(dir.path().join("state").join("activity.json"));
        assert!(surface.read_record().expect("read missing").is_none());

        surface.start(&snapshot(0, 2)).await.expect("start");
        surface.update(&snapshot(1, 2)).await.expect("update");
        match surface.read_record().expect("read").expect("record exists") {
            ActivityRecord::Running { snapshot, .. } => assert_eq!(snapshot.completed_tasks, 1),
            other => panic!("unexpected record: {other:?}"),
        }

        surface.end(ActivityEndReason::ManualReset).await.expect("end");
        assert!(!dir.path().join("state").join("activity.json.tmp").exists());
        match surface.read_record().expect("read").expect("record exists") {
            ActivityRecord::Ended { reason, .. } => assert_eq!(reason, ActivityEndReason::ManualReset),
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn json_file_surface_rejects_inconsistent_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let surface = JsonFileDisplaySurface::new(dir.path().join("activity.json"));
        let mut broken = snapshot(1, 2);
        broken.remaining_tasks = 5;

        let result = surface.start(&broken).await;
        assert!(matches!(result, Err(InfraError::Surface(_))));
        assert!(surface.read_record().expect("read").is_none());
    }

    #[tokio::test]
    async fn recording_surface_logs_accepted_calls_only() {
        let surface = RecordingDisplaySurface::default();
        surface.fail_with(Some(SurfaceFailure::Unsupported));
        let error = surface.start(&snapshot(0, 1)).await.expect_err("start should fail");
        assert_eq!(error.surface_category(), "unsupported");

        surface.fail_with(None);
        surface.start(&snapshot(0, 1)).await.expect("start");
        surface.end(ActivityEndReason::Completed).await.expect("end");

        assert_eq!(surface.attempts(), 3);
        assert_eq!(surface.start_count(), 1);
        assert_eq!(surface.end_reasons(), vec![ActivityEndReason::Completed]);
    }

    #[test]
    fn capability_resolves_from_preference() {
        let surface: Arc<dyn DisplaySurface> = Arc::new(RecordingDisplaySurface::default());
        assert!(SurfaceCapability::resolve(true, surface.clone()).is_present());
        assert!(!SurfaceCapability::resolve(false, surface).is_present());
    }
}
