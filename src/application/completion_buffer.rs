use crate::domain::models::Task;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs once a buffered completion has been written.
pub type SettledCallback = Box<dyn FnOnce(&Task) + Send>;

pub struct PendingCompletion {
    token: CancellationToken,
    generation: u64,
    on_settled: Option<SettledCallback>,
}

impl PendingCompletion {
    pub fn into_callback(self) -> Option<SettledCallback> {
        self.on_settled
    }
}

impl fmt::Debug for PendingCompletion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingCompletion")
            .field("generation", &self.generation)
            .field("cancelled", &self.token.is_cancelled())
            .field("has_callback", &self.on_settled.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    /// A new delayed completion was armed.
    Started {
        token: CancellationToken,
        generation: u64,
    },
    /// An existing pending completion was withdrawn.
    Cancelled,
}

/// Pending completions keyed by task id. At most one record per id.
#[derive(Debug, Default)]
pub struct CompletionBuffer {
    pending: HashMap<String, PendingCompletion>,
    next_generation: u64,
}

impl CompletionBuffer {
    pub fn toggle(&mut self, task_id: &str, on_settled: Option<SettledCallback>) -> ToggleOutcome {
        if let Some(existing) = self.pending.remove(task_id) {
            existing.token.cancel();
            return ToggleOutcome::Cancelled;
        }

        self.next_generation += 1;
        let token = CancellationToken::new();
        self.pending.insert(
            task_id.to_string(),
            PendingCompletion {
                token: token.clone(),
                generation: self.next_generation,
                on_settled,
            },
        );
        ToggleOutcome::Started {
            token,
            generation: self.next_generation,
        }
    }

    /// Removes the record for `task_id` only if it is still the one armed as `generation`.
    pub fn take_if_current(&mut self, task_id: &str, generation: u64) -> Option<PendingCompletion> {
        let current = self
            .pending
            .get(task_id)
            .is_some_and(|record| record.generation == generation && !record.token.is_cancelled());
        if current {
            self.pending.remove(task_id)
        } else {
            None
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        for (_, record) in self.pending.drain() {
            record.token.cancel();
        }
        cancelled
    }

    /// Cancels records whose task id is not in `live_ids`.
    pub fn retain_ids(&mut self, live_ids: &HashSet<String>) {
        self.pending.retain(|task_id, record| {
            let keep = live_ids.contains(task_id);
            if !keep {
                record.token.cancel();
            }
            keep
        });
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        self.pending.contains_key(task_id)
    }

    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids = self.pending.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }
}

/// Sleeps for `delay` unless `token` fires first. Returns `true` when the delay elapsed.
pub async fn wait_for_settle(token: CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => !token.is_cancelled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn started(outcome: ToggleOutcome) -> (CancellationToken, u64) {
        match outcome {
            ToggleOutcome::Started { token, generation } => (token, generation),
            ToggleOutcome::Cancelled => panic!("expected a started completion"),
        }
    }

    #[test]
    fn second_toggle_cancels_instead_of_arming_twice() {
        let mut buffer = CompletionBuffer::default();
        let (token, _) = started(buffer.toggle("tsk-1", None));
        assert!(buffer.is_pending("tsk-1"));

        assert!(matches!(buffer.toggle("tsk-1", None), ToggleOutcome::Cancelled));
        assert!(token.is_cancelled());
        assert!(buffer.pending_ids().is_empty());
    }

    #[test]
    fn stale_generation_is_not_taken() {
        let mut buffer = CompletionBuffer::default();
        let (_, first) = started(buffer.toggle("tsk-1", None));
        buffer.toggle("tsk-1", None);
        let (_, second) = started(buffer.toggle("tsk-1", None));
        assert_ne!(first, second);

        assert!(buffer.take_if_current("tsk-1", first).is_none());
        let record = buffer
            .take_if_current("tsk-1", second)
            .expect("current record");
        assert_eq!(record.generation, second);
        assert!(!buffer.is_pending("tsk-1"));
    }

    #[test]
    fn callbacks_travel_with_the_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut buffer = CompletionBuffer::default();
        let (_, generation) = started(buffer.toggle(
            "tsk-1",
            Some(Box::new(move |_task: &Task| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        ));

        let callback = buffer
            .take_if_current("tsk-1", generation)
            .and_then(PendingCompletion::into_callback)
            .expect("callback kept");
        let task = Task::new("Write report", chrono::Utc::now());
        callback(&task);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_all_and_retain_cancel_tokens() {
        let mut buffer = CompletionBuffer::default();
        let (kept, _) = started(buffer.toggle("tsk-1", None));
        let (dropped, _) = started(buffer.toggle("tsk-2", None));

        buffer.retain_ids(&HashSet::from(["tsk-1".to_string()]));
        assert!(dropped.is_cancelled());
        assert!(!kept.is_cancelled());
        assert_eq!(buffer.pending_ids(), vec!["tsk-1".to_string()]);

        assert_eq!(buffer.cancel_all(), 1);
        assert!(kept.is_cancelled());
        assert!(buffer.pending_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_settle_reports_elapsed_or_cancelled() {
        let token = CancellationToken::new();
        assert!(wait_for_settle(token, Duration::from_millis(1500)).await);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });
        assert!(!wait_for_settle(token, Duration::from_millis(1500)).await);
    }
}
