//! Periodic task scheduling for counter sweeps.
//!
//! The limiter never spawns timers itself. It asks a [`Scheduler`] to run the
//! sweep every interval, which lets tests fire sweeps by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::error::{GatekeeperError, Result};

/// A callback run on every tick.
pub type PeriodicTask = Arc<dyn Fn() + Send + Sync>;

/// Cancels a scheduled task.
pub trait TaskHandle: Send + Sync {
    /// Stop running the task. Idempotent.
    fn cancel(&self);
}

/// Runs a callback every `period`.
pub trait Scheduler: Send + Sync {
    fn schedule_every(&self, period: Duration, task: PeriodicTask) -> Box<dyn TaskHandle>;
}

/// Scheduler backed by a tokio interval task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| GatekeeperError::Runtime(e.to_string()))?;
        Ok(Self::new(handle))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_every(&self, period: Duration, task: PeriodicTask) -> Box<dyn TaskHandle> {
        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                trace!("Running scheduled task");
                task();
            }
        });
        Box::new(TokioTaskHandle { join })
    }
}

/// Handle for a task spawned by [`TokioScheduler`]; aborts the task on cancel or drop.
struct TokioTaskHandle {
    join: JoinHandle<()>,
}

impl TaskHandle for TokioTaskHandle {
    fn cancel(&self) {
        self.join.abort();
    }
}

impl Drop for TokioTaskHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

struct ManualTask {
    period: Duration,
    task: PeriodicTask,
    cancelled: Arc<AtomicBool>,
}

/// A scheduler whose tasks run only when [`run_pending`](Self::run_pending) is called.
#[derive(Default, Clone)]
pub struct ManualScheduler {
    tasks: Arc<Mutex<Vec<ManualTask>>>,
}

impl ManualScheduler {
    /// Create a scheduler with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live task once. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        // Clone the callbacks out so a task may touch the scheduler.
        let live: Vec<PeriodicTask> = {
            let mut tasks = self.tasks.lock();
            tasks.retain(|t| !t.cancelled.load(Ordering::SeqCst));
            tasks.iter().map(|t| Arc::clone(&t.task)).collect()
        };
        for task in &live {
            task();
        }
        live.len()
    }

    /// Number of tasks that have not been cancelled.
    pub fn live_tasks(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Periods of the live tasks, in scheduling order.
    pub fn periods(&self) -> Vec<Duration> {
        self.tasks
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.period)
            .collect()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("live_tasks", &self.live_tasks())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_every(&self, period: Duration, task: PeriodicTask) -> Box<dyn TaskHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().push(ManualTask {
            period,
            task,
            cancelled: Arc::clone(&cancelled),
        });
        Box::new(ManualTaskHandle { cancelled })
    }
}

struct ManualTaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle for ManualTaskHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task() -> (Arc<AtomicUsize>, PeriodicTask) {
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = Arc::clone(&runs);
        let task: PeriodicTask = Arc::new(move || {
            task_runs.fetch_add(1, Ordering::SeqCst);
        });
        (runs, task)
    }

    #[test]
    fn test_manual_scheduler_runs_on_demand() {
        let scheduler = ManualScheduler::new();
        let (runs, task) = counting_task();

        let _handle = scheduler.schedule_every(Duration::from_secs(60), task);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.periods(), vec![Duration::from_secs(60)]);

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_manual_scheduler_cancel() {
        let scheduler = ManualScheduler::new();
        let (runs, task) = counting_task();

        let handle = scheduler.schedule_every(Duration::from_secs(1), task);
        handle.cancel();
        handle.cancel();

        assert_eq!(scheduler.live_tasks(), 0);
        assert_eq!(scheduler.run_pending(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tokio_scheduler_requires_runtime() {
        let err = TokioScheduler::current().unwrap_err();
        assert!(matches!(err, GatekeeperError::Runtime(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_every_period() {
        let scheduler = TokioScheduler::current().unwrap();
        let (runs, task) = counting_task();

        let handle = scheduler.schedule_every(Duration::from_secs(10), task);

        // Nothing runs on the immediate first tick.
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_handle_drop_cancels_task() {
        let scheduler = TokioScheduler::current().unwrap();
        let (runs, task) = counting_task();

        let handle = scheduler.schedule_every(Duration::from_secs(10), task);
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
