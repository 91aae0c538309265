use crate::models::RunStats;
use crate::pipeline::TriagePipeline;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between the end of one run and the start of the next
    pub run_interval: Duration,
    /// How often the loop checks whether a run is due
    pub poll_interval: Duration,
    /// Fire the first run immediately instead of one interval after start
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            run_interval: Duration::from_secs(crate::config::defaults::RUN_INTERVAL_SECS),
            poll_interval: Duration::from_secs(1), // Check every second
            run_on_startup: false,
        }
    }
}

/// Work the scheduler triggers
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run_once(&self) -> Result<RunStats, String>;
}

#[async_trait]
impl ScheduledJob for TriagePipeline {
    async fn run_once(&self) -> Result<RunStats, String> {
        self.run().await
    }
}

/// Lifetime counters, mostly for logs and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub runs_started: u64,
    pub runs_failed: u64,
}

/// Runs a job on a fixed cadence until shutdown.
///
/// Runs never overlap: the poll loop is blocked while a run executes. A run
/// that returns `Err` or panics is logged and counted; the loop keeps going.
pub struct Scheduler {
    job: Arc<dyn ScheduledJob>,
    config: SchedulerConfig,
    runs_started: AtomicU64,
    runs_failed: AtomicU64,
}

impl Scheduler {
    pub fn new(job: Arc<dyn ScheduledJob>, config: SchedulerConfig) -> Self {
        Scheduler {
            job,
            config,
            runs_started: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            runs_started: self.runs_started.load(Ordering::SeqCst),
            runs_failed: self.runs_failed.load(Ordering::SeqCst),
        }
    }

    /// Start the scheduler loop
    pub async fn start(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        log::info!(
            "Scheduler started (interval: {}s, poll: {}ms, run on startup: {})",
            self.config.run_interval.as_secs(),
            self.config.poll_interval.as_millis(),
            self.config.run_on_startup
        );

        let mut poll_interval = interval(self.config.poll_interval);
        // A long run must not be followed by a burst of catch-up ticks
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut next_run = if self.config.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + self.config.run_interval
        };

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    log::info!("Scheduler received shutdown signal");
                    break;
                }
                _ = poll_interval.tick() => {
                    if Instant::now() >= next_run {
                        self.execute_run().await;
                        next_run = Instant::now() + self.config.run_interval;
                    }
                }
            }
        }

        let stats = self.stats();
        log::info!(
            "Scheduler stopped after {} run(s), {} failed",
            stats.runs_started,
            stats.runs_failed
        );
    }

    /// Execute a single run with failure isolation
    pub async fn execute_run(&self) -> Option<RunStats> {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
        log::info!("Starting Job: {}", Utc::now().to_rfc3339());

        let outcome = AssertUnwindSafe(self.job.run_once()).catch_unwind().await;

        match outcome {
            Ok(Ok(stats)) => {
                log::info!(
                    "Finished Job: {}, Found: {}, Replied: {}, Errors: {}",
                    Utc::now().to_rfc3339(),
                    stats.mentions_found,
                    stats.mentions_replied,
                    stats.mentions_replied_errors
                );
                Some(stats)
            }
            Ok(Err(e)) => {
                self.runs_failed.fetch_add(1, Ordering::SeqCst);
                log::error!("Job failed at {}: {}", Utc::now().to_rfc3339(), e);
                None
            }
            Err(panic) => {
                self.runs_failed.fetch_add(1, Ordering::SeqCst);
                log::error!(
                    "Job panicked at {}: {}",
                    Utc::now().to_rfc3339(),
                    panic_message(panic.as_ref())
                );
                None
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
