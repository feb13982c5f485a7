//! Restart-safe periodic driver for the reconciler.

use crate::core::MAX_INTERVAL;
use crate::engine::Reconciler;
use crate::error::{Result, ValidationError};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Whether the periodic task is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No periodic task exists.
    Stopped,
    /// Exactly one periodic task is ticking.
    Running,
}

struct Ticker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs [`Reconciler::check`] every interval.
///
/// At most one periodic task exists at any instant. [`stop`](Self::stop)
/// and [`restart`](Self::restart) cancel the running task and wait for it
/// to exit before returning or spawning its replacement, so ticks from an
/// old interval can never overlap ticks from a new one.
///
/// [`state`](Self::state) and [`interval`](Self::interval) never wait on
/// that handover: a task being retired already reads as stopped.
///
/// # Examples
///
/// ```rust,no_run
/// use stockwatch::engine::{Reconciler, Scheduler, SchedulerState};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(reconciler: Arc<Reconciler>) -> stockwatch::error::Result<()> {
/// let scheduler = Scheduler::new(reconciler);
/// scheduler.start(Duration::from_secs(3600)).await?;
/// assert_eq!(scheduler.state(), SchedulerState::Running);
///
/// // Interval changed by an operator
/// scheduler.restart(Duration::from_secs(30 * 60)).await?;
///
/// scheduler.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    /// Lifecycle lock; held across the wait for a retiring task
    ticker: Mutex<Option<Ticker>>,
    /// Interval of the admitted task, readable without the lifecycle lock
    running: watch::Sender<Option<Duration>>,
    live_tasks: Arc<AtomicUsize>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            ticker: Mutex::new(None),
            running: watch::Sender::new(None),
            live_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start ticking every `interval`. The first tick fires one interval
    /// from now.
    ///
    /// Returns `false` without doing anything if already running.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is zero or longer than
    /// [`MAX_INTERVAL`].
    pub async fn start(&self, interval: Duration) -> Result<bool> {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return Ok(false);
        }
        *ticker = Some(self.spawn(interval)?);
        self.running.send_replace(Some(interval));
        Ok(true)
    }

    /// Cancel the periodic task and wait for it to exit.
    ///
    /// A cycle already in progress finishes first. Returns `false` if the
    /// scheduler was already stopped.
    pub async fn stop(&self) -> bool {
        let mut ticker = self.ticker.lock().await;
        self.retire(ticker.take()).await
    }

    /// Retire any running task, then start a fresh one with `interval`.
    ///
    /// Always ends running on success.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is out of range; the old task is left running
    /// in that case.
    pub async fn restart(&self, interval: Duration) -> Result<()> {
        check_interval(interval)?;

        let mut ticker = self.ticker.lock().await;
        self.retire(ticker.take()).await;
        *ticker = Some(self.spawn(interval)?);
        self.running.send_replace(Some(interval));

        tracing::info!(interval = ?interval, "Scheduler restarted");
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        match *self.running.borrow() {
            Some(_) => SchedulerState::Running,
            None => SchedulerState::Stopped,
        }
    }

    /// Interval of the running task, if any.
    pub fn interval(&self) -> Option<Duration> {
        *self.running.borrow()
    }

    /// Subscribe to state changes. The value is the running interval, or
    /// `None` while stopped.
    pub fn watch(&self) -> watch::Receiver<Option<Duration>> {
        self.running.subscribe()
    }

    /// Number of periodic tasks that have not exited yet.
    pub fn live_tasks(&self) -> usize {
        self.live_tasks.load(Ordering::SeqCst)
    }

    fn spawn(&self, interval: Duration) -> Result<Ticker> {
        check_interval(interval)?;

        let token = CancellationToken::new();
        let live = LiveTask::enter(&self.live_tasks);
        let reconciler = Arc::clone(&self.reconciler);

        reconciler.clock().schedule_next(Utc::now(), interval);
        let handle = tokio::spawn(tick_loop(reconciler, interval, token.clone(), live));

        tracing::info!(interval = ?interval, "Scheduler started");
        Ok(Ticker { token, handle })
    }

    async fn retire(&self, ticker: Option<Ticker>) -> bool {
        let Some(ticker) = ticker else {
            return false;
        };

        self.running.send_replace(None);
        ticker.token.cancel();
        if let Err(e) = ticker.handle.await {
            tracing::error!(error = %e, "Periodic task ended abnormally");
        }
        self.reconciler.clock().clear_next();

        tracing::info!("Scheduler stopped");
        true
    }
}

async fn tick_loop(
    reconciler: Arc<Reconciler>,
    interval: Duration,
    token: CancellationToken,
    _live: LiveTask,
) {
    let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticks.tick() => {}
        }

        reconciler.clock().schedule_next(Utc::now(), interval);
        if reconciler.check_unless_cancelled(false, &token).await.is_none() {
            break;
        }
    }

    tracing::debug!("Periodic task exited");
}

fn check_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(ValidationError::invalid_field("interval", "must be greater than 0").into());
    }
    if interval > MAX_INTERVAL {
        return Err(ValidationError::invalid_field("interval", "must be at most 366 days").into());
    }
    Ok(())
}

/// Counts a periodic task as live until dropped.
struct LiveTask(Arc<AtomicUsize>);

impl LiveTask {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveTask {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
