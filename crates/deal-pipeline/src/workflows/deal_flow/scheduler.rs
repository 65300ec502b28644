use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, Instrument};

/// What a timer was armed for; used for tracing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    DelayedAction,
    ScheduledAction,
    AutoAdvance,
}

impl TimerKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DelayedAction => "delayed_action",
            Self::ScheduledAction => "scheduled_action",
            Self::AutoAdvance => "auto_advance",
        }
    }
}

/// Fire-and-forget timers backed by tokio tasks.
///
/// Each timer runs on its own task, so a slow collaborator call made by one
/// callback never holds up another timer. Timers are not cancelled
/// individually; callbacks re-check their preconditions when they fire.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` after `delay`. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, kind: TimerKind, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.schedule_at(kind, Instant::now() + delay, task);
    }

    /// Runs `task` once `deadline` has passed; a deadline already in the past
    /// fires on the next poll.
    pub fn schedule_at<F>(&self, kind: TimerKind, deadline: Instant, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = deadline.saturating_duration_since(Instant::now());
        let span = tracing::debug_span!("timer", kind = kind.label(), delay_ms = delay.as_millis() as u64);
        let handle = tokio::spawn(
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep_until(deadline).await;
                }
                debug!("timer fired");
                task.await;
            }
            .instrument(span),
        );

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|handle| !handle.is_finished());
        tasks.push(handle);
    }

    /// Number of timers that have not finished running.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|handle| !handle.is_finished());
        tasks.len()
    }

    /// Aborts every outstanding timer.
    pub fn shutdown(&self) {
        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let aborted = tasks.len();
        for handle in tasks {
            handle.abort();
        }
        debug!(aborted, "scheduler shut down");
    }
}
