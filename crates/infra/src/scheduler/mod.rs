//! In-process job scheduler.
//!
//! A background tokio task sleeps until the next due minute, runs the due
//! jobs one after another, and repeats until shut down. A failing job is
//! logged and counted; it never stops the loop.

pub mod cron;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::jobs::{CrmJobs, JobKind, JobReport};

pub use cron::{CronError, CronSchedule};

/// Scheduler runtime statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub runs: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub last_job: Option<JobKind>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl SchedulerStats {
    fn record(&mut self, report: &JobReport, at: DateTime<Utc>) {
        self.runs += 1;
        if report.succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.last_job = Some(report.kind);
        self.last_run_at = Some(at);
    }
}

/// Handle to control a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl SchedulerHandle {
    /// Request graceful shutdown and wait for the loop to exit. A job that is
    /// already running is allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        lock_stats(&self.stats).clone()
    }
}

fn lock_stats(stats: &Mutex<SchedulerStats>) -> std::sync::MutexGuard<'_, SchedulerStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Scheduler {
    jobs: CrmJobs,
    entries: Vec<(JobKind, CronSchedule)>,
}

impl Scheduler {
    /// One entry per job, using the schedules in the jobs' configuration.
    pub fn from_config(jobs: CrmJobs) -> Result<Self, CronError> {
        let entries = JobKind::ALL
            .into_iter()
            .map(|kind| Ok((kind, CronSchedule::parse(kind.schedule(jobs.config()))?)))
            .collect::<Result<Vec<_>, CronError>>()?;
        Ok(Self { jobs, entries })
    }

    pub fn entries(&self) -> &[(JobKind, CronSchedule)] {
        &self.entries
    }

    /// Earliest due time after `after`, with every job due at that minute.
    pub fn next_due(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<JobKind>)> {
        let due: Vec<(JobKind, DateTime<Utc>)> = self
            .entries
            .iter()
            .filter_map(|(kind, schedule)| schedule.next_after(after).map(|at| (*kind, at)))
            .collect();
        let earliest = due.iter().map(|(_, at)| *at).min()?;
        let kinds = due
            .into_iter()
            .filter(|(_, at)| *at == earliest)
            .map(|(kind, _)| kind)
            .collect();
        Some((earliest, kinds))
    }

    /// Run, in entry order, every job whose schedule matches `at`.
    pub async fn tick(&self, at: DateTime<Utc>) -> Vec<JobReport> {
        let mut reports = Vec::new();
        for (kind, schedule) in &self.entries {
            if schedule.matches(at) {
                reports.push(self.run_logged(*kind).await);
            }
        }
        reports
    }

    async fn run_logged(&self, kind: JobKind) -> JobReport {
        let report = self.jobs.run(kind).await;
        if report.succeeded {
            info!(job = %kind, summary = %report.summary, "scheduled job finished");
        } else {
            warn!(job = %kind, summary = %report.summary, "scheduled job failed");
        }
        report
    }

    /// Spawn the scheduler loop on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let stats = Arc::new(Mutex::new(SchedulerStats::default()));
        let loop_stats = Arc::clone(&stats);

        let join = tokio::spawn(async move {
            info!(jobs = self.entries.len(), "scheduler started");
            loop {
                let now = Utc::now();
                let Some((due, kinds)) = self.next_due(now) else {
                    warn!("no job is ever due; scheduler stopping");
                    break;
                };
                let wait = (due - now).to_std().unwrap_or_default();
                debug!(?kinds, %due, "sleeping until next due jobs");

                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                for kind in kinds {
                    let report = self.run_logged(kind).await;
                    lock_stats(&loop_stats).record(&report, Utc::now());
                }
            }
            info!("scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            join,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::config::{CrmConfig, LogPaths};
    use crate::jobs::testing::FakeRemote;
    use crate::store::InMemoryCrmStore;

    fn jobs(dir: &std::path::Path, config: CrmConfig) -> CrmJobs {
        let mut config = config;
        config.logs.heartbeat = LogPaths {
            primary: dir.join("heartbeat.txt"),
            fallback: None,
        };
        config.logs.report = LogPaths {
            primary: dir.join("report.txt"),
            fallback: None,
        };
        config.logs.low_stock = LogPaths {
            primary: dir.join("low_stock.txt"),
            fallback: None,
        };
        config.logs.customer_cleanup = LogPaths {
            primary: dir.join("cleanup.txt"),
            fallback: None,
        };
        config.logs.order_reminders = LogPaths {
            primary: dir.join("reminders.txt"),
            fallback: None,
        };
        CrmJobs::new(
            config,
            Arc::new(InMemoryCrmStore::new()),
            Arc::new(FakeRemote::default()),
        )
        .unwrap()
    }

    #[test]
    fn default_schedules_parse() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::from_config(jobs(dir.path(), CrmConfig::default())).unwrap();
        assert_eq!(scheduler.entries().len(), 5);
    }

    #[test]
    fn next_due_groups_coinciding_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::from_config(jobs(dir.path(), CrmConfig::default())).unwrap();

        // Monday 2026-02-23 05:58: heartbeat at 06:00 coincides with the report.
        let after = Utc.with_ymd_and_hms(2026, 2, 23, 5, 58, 0).unwrap();
        let (due, kinds) = scheduler.next_due(after).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2026, 2, 23, 6, 0, 0).unwrap());
        assert_eq!(kinds, vec![JobKind::Heartbeat, JobKind::Report]);
    }

    #[tokio::test]
    async fn tick_runs_only_matching_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::from_config(jobs(dir.path(), CrmConfig::default())).unwrap();

        let at = Utc.with_ymd_and_hms(2026, 2, 23, 8, 0, 0).unwrap();
        let reports = scheduler.tick(at).await;
        let kinds: Vec<JobKind> = reports.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![JobKind::Heartbeat, JobKind::OrderReminders]);
        assert!(dir.path().join("reminders.txt").exists());
        assert!(!dir.path().join("report.txt").exists());
    }

    #[tokio::test]
    async fn spawned_scheduler_runs_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CrmConfig::default();
        config.schedule.heartbeat = "* * * * *".into();

        let handle = Scheduler::from_config(jobs(dir.path(), config)).unwrap().spawn();
        handle.shutdown().await;
    }
}
