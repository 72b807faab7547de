use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error};
use uuid::Uuid;

/// Action fired by the scheduler. Must be callable on every tick.
pub type ScheduledAction =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Opaque handle identifying one scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(Uuid);

impl ScheduleHandle {
    /// Mint a fresh handle. Scheduler implementations create one per job.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScheduleHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduler backend error: {0}")]
    Backend(String),
}

impl From<tokio_cron_scheduler::JobSchedulerError> for ScheduleError {
    fn from(e: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Port to the timer substrate driving poll cycles.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Schedule `action` to fire once at `at` (immediately if in the past).
    async fn schedule_at(
        &self,
        at: DateTime<Utc>,
        action: ScheduledAction,
    ) -> Result<ScheduleHandle, ScheduleError>;

    /// Schedule `action` to first fire at `start_at` (immediately if in the
    /// past) and then repeat every `every` until cancelled.
    async fn schedule_repeating(
        &self,
        start_at: DateTime<Utc>,
        every: Duration,
        action: ScheduledAction,
    ) -> Result<ScheduleHandle, ScheduleError>;

    /// Cancel a scheduled job. Cancelling an unknown handle is a no-op.
    async fn cancel(&self, handle: ScheduleHandle) -> Result<(), ScheduleError>;
}

/// Production scheduler on tokio-cron-scheduler.
///
/// A delayed start is a one-shot job at the activation instant that runs the
/// first tick and then installs the repeating job. The handle indirection map
/// keeps `cancel` valid across that swap: cancel removes the map entry, and
/// the swap re-checks it before installing the repeat.
#[derive(Clone)]
pub struct CronScheduler {
    inner: JobScheduler,
    jobs: Arc<Mutex<HashMap<ScheduleHandle, Uuid>>>,
}

impl CronScheduler {
    pub async fn new() -> Result<Self, ScheduleError> {
        let inner = JobScheduler::new().await?;
        inner.start().await?;
        Ok(Self {
            inner,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn shutdown(&mut self) -> Result<(), ScheduleError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    fn repeated_job(every: Duration, action: ScheduledAction) -> Result<Job, ScheduleError> {
        let job = Job::new_repeated_async(every, move |_id, _sched| {
            let action = Arc::clone(&action);
            Box::pin(async move { action().await })
        })?;
        Ok(job)
    }

    /// Swap the one-shot leg's map entry for a freshly installed repeated
    /// job. A cancel that landed first removed the entry, so the install is
    /// skipped and nothing is left behind. Returns whether the repeat was
    /// installed.
    async fn install_repeat(
        inner: &JobScheduler,
        jobs: &Mutex<HashMap<ScheduleHandle, Uuid>>,
        handle: ScheduleHandle,
        every: Duration,
        action: ScheduledAction,
    ) -> bool {
        let repeat = match Self::repeated_job(every, action) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "failed to build repeated job");
                return false;
            }
        };

        let mut map = jobs.lock().await;
        if !map.contains_key(&handle) {
            debug!("schedule cancelled before repeat installed");
            return false;
        }

        match inner.add(repeat).await {
            Ok(guid) => {
                map.insert(handle, guid);
                true
            }
            Err(e) => {
                error!(error = %e, "failed to install repeated job");
                false
            }
        }
    }
}

fn to_delay(at: DateTime<Utc>) -> Duration {
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

#[async_trait]
impl Scheduler for CronScheduler {
    async fn schedule_at(
        &self,
        at: DateTime<Utc>,
        action: ScheduledAction,
    ) -> Result<ScheduleHandle, ScheduleError> {
        let handle = ScheduleHandle::new();
        let jobs = Arc::clone(&self.jobs);

        let job = Job::new_one_shot_at_instant_async(Instant::now() + to_delay(at), {
            move |_id, _sched| {
                let jobs = Arc::clone(&jobs);
                let action = Arc::clone(&action);
                Box::pin(async move {
                    action().await;
                    jobs.lock().await.remove(&handle);
                })
            }
        })?;

        // hold the map lock across add so the job cannot observe a missing
        // entry between firing and registration
        let mut map = self.jobs.lock().await;
        let guid = self.inner.add(job).await?;
        map.insert(handle, guid);
        Ok(handle)
    }

    async fn schedule_repeating(
        &self,
        start_at: DateTime<Utc>,
        every: Duration,
        action: ScheduledAction,
    ) -> Result<ScheduleHandle, ScheduleError> {
        let handle = ScheduleHandle::new();
        let delay = to_delay(start_at);

        let inner = self.inner.clone();
        let jobs = Arc::clone(&self.jobs);

        let first = Job::new_one_shot_at_instant_async(Instant::now() + delay, {
            move |_id, _sched| {
                let inner = inner.clone();
                let jobs = Arc::clone(&jobs);
                let action = Arc::clone(&action);

                Box::pin(async move {
                    action().await;
                    Self::install_repeat(&inner, &jobs, handle, every, Arc::clone(&action)).await;
                })
            }
        })?;

        let mut map = self.jobs.lock().await;
        let first_guid = self.inner.add(first).await?;
        map.insert(handle, first_guid);
        Ok(handle)
    }

    async fn cancel(&self, handle: ScheduleHandle) -> Result<(), ScheduleError> {
        let removed = self.jobs.lock().await.remove(&handle);
        if let Some(guid) = removed {
            self.inner.remove(&guid).await?;
        }
        Ok(())
    }
}
