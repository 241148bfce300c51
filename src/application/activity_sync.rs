use crate::domain::models::{ActivityEndReason, DisplaySnapshot, DisplayTask, Task};
use crate::domain::policy::DAILY_LIMIT;
use crate::infrastructure::config::AllCompletedPolicy;
use crate::infrastructure::display_surface::SurfaceCapability;
use crate::infrastructure::error::InfraError;
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;

const DEFAULT_SURFACE_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBuilder {
    policy: AllCompletedPolicy,
}

impl SnapshotBuilder {
    pub fn new(policy: AllCompletedPolicy) -> Self {
        Self { policy }
    }

    /// Builds the snapshot for one day's tasks. Completed tasks come first, then
    /// creation time ascending; at most `DAILY_LIMIT` tasks are shown.
    pub fn build(&self, day_tasks: &[Task]) -> Option<DisplaySnapshot> {
        let total_tasks = day_tasks.len();
        if total_tasks == 0 {
            return None;
        }
        let completed_tasks = day_tasks.iter().filter(|task| task.is_completed).count();
        let remaining_tasks = total_tasks - completed_tasks;
        if remaining_tasks == 0 && self.policy == AllCompletedPolicy::End {
            return None;
        }

        let mut ordered = day_tasks.iter().collect::<Vec<_>>();
        ordered.sort_by(|left, right| {
            right
                .is_completed
                .cmp(&left.is_completed)
                .then_with(|| left.created_at.cmp(&right.created_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        let tasks = ordered
            .into_iter()
            .take(DAILY_LIMIT)
            .map(|task| DisplayTask {
                id: task.id.clone(),
                content: task.content.clone(),
                is_completed: task.is_completed,
            })
            .collect();

        let status_message = if remaining_tasks == 0 {
            format!("All {total_tasks} focus tasks done")
        } else {
            format!("{completed_tasks}/{total_tasks} focus tasks done")
        };

        Some(DisplaySnapshot {
            tasks,
            total_tasks,
            completed_tasks,
            remaining_tasks,
            progress: completed_tasks as f64 / total_tasks as f64,
            status_message,
        })
    }
}

/// Start/update/end state machine in front of the display surface.
/// Surface failures are logged and never returned.
#[derive(Debug)]
pub struct ExternalSyncBridge {
    capability: SurfaceCapability,
    builder: SnapshotBuilder,
    surface_timeout: Duration,
    running: bool,
}

impl ExternalSyncBridge {
    pub fn new(capability: SurfaceCapability, policy: AllCompletedPolicy) -> Self {
        Self {
            capability,
            builder: SnapshotBuilder::new(policy),
            surface_timeout: DEFAULT_SURFACE_TIMEOUT,
            running: false,
        }
    }

    pub fn with_surface_timeout(mut self, surface_timeout: Duration) -> Self {
        self.surface_timeout = surface_timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub async fn handle_tasks_changed(&mut self, day_tasks: &[Task]) {
        let SurfaceCapability::Present(surface) = self.capability.clone() else {
            return;
        };

        match self.builder.build(day_tasks) {
            Some(snapshot) if self.running => {
                self.call("update", surface.update(&snapshot)).await;
            }
            Some(snapshot) => {
                if self.call("start", surface.start(&snapshot)).await {
                    self.running = true;
                    info!(
                        "event=activity_started total={} completed={}",
                        snapshot.total_tasks, snapshot.completed_tasks
                    );
                }
            }
            None => self.end_activity(ActivityEndReason::Completed).await,
        }
    }

    /// Ends a running activity. Idle bridges do not touch the surface.
    pub async fn end_activity(&mut self, reason: ActivityEndReason) {
        if !self.running {
            return;
        }
        let SurfaceCapability::Present(surface) = self.capability.clone() else {
            self.running = false;
            return;
        };
        self.call("end", surface.end(reason)).await;
        self.running = false;
        info!("event=activity_ended reason={}", reason.as_str());
    }

    async fn call<F>(&self, operation: &str, request: F) -> bool
    where
        F: Future<Output = Result<(), InfraError>>,
    {
        let error = match tokio::time::timeout(self.surface_timeout, request).await {
            Ok(Ok(())) => {
                debug!("event=surface_call operation={operation} status=ok");
                return true;
            }
            Ok(Err(error)) => error,
            Err(_) => InfraError::SurfaceTimeout(self.surface_timeout.as_millis() as u64),
        };
        warn!(
            "event=surface_call operation={operation} status=swallowed category={} error={error}",
            error.surface_category()
        );
        false
    }
}
