// ── Background job scheduling ──
//
// Every deferred or repeating piece of work (status checks, poll ticks,
// command submission, account probes) goes through a `Scheduler` handed to
// each component at construction. Submission never blocks the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A unit of work submitted to a [`Scheduler`].
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Builds a fresh [`Job`] for each tick of a repeating schedule.
pub type JobFactory = Box<dyn Fn() -> Job + Send + Sync + 'static>;

/// Background task capability shared by the account connection, every
/// device synchronizer and discovery.
pub trait Scheduler: Send + Sync {
    /// Run `job` as soon as possible.
    fn execute(&self, job: Job);

    /// Run `job` once after `delay`.
    fn schedule(&self, delay: Duration, job: Job) -> JobHandle;

    /// Run a job built by `job` every `period`, first after `initial_delay`.
    /// A zero `period` schedules nothing and returns a finished handle.
    fn schedule_at_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        job: JobFactory,
    ) -> JobHandle;
}

// ── JobHandle ────────────────────────────────────────────────────

/// Handle to a scheduled job.
///
/// Cancelling stops a job that is still waiting for its delay or its next
/// tick. A job body that is already running is allowed to finish. Cancelling
/// twice, or cancelling a finished job, is a no-op.
#[derive(Debug, Clone)]
pub struct JobHandle {
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl JobHandle {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    fn already_finished() -> Self {
        let handle = Self::new();
        handle.finish();
        handle
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    /// Cancel the job. Returns `true` if it was still live.
    pub fn cancel(&self) -> bool {
        let was_live = self.is_live();
        self.cancel.cancel();
        was_live
    }

    /// `true` until the job is cancelled or has run to completion.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.finished.load(Ordering::Acquire)
    }
}

// ── TokioScheduler ───────────────────────────────────────────────

/// [`Scheduler`] backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn execute(&self, job: Job) {
        self.handle.spawn(job);
    }

    fn schedule(&self, delay: Duration, job: Job) -> JobHandle {
        let handle = JobHandle::new();
        let task = handle.clone();

        self.handle.spawn(async move {
            tokio::select! {
                biased;
                () = task.cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            job.await;
            task.finish();
        });

        handle
    }

    fn schedule_at_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        job: JobFactory,
    ) -> JobHandle {
        if period.is_zero() {
            return JobHandle::already_finished();
        }

        let handle = JobHandle::new();
        let task = handle.clone();

        self.handle.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + initial_delay, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = task.cancel.cancelled() => break,
                    _ = ticks.tick() => job().await,
                }
            }
            task.finish();
        });

        handle
    }
}
