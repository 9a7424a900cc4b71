//! Long-running convert/upload jobs owned by the session.
//!
//! Cancellation is advisory: a job is only removed from the registry once it
//! reports a status other than [`JobStatus::Running`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

pub trait BackgroundJob: Send + Sync {
    fn name(&self) -> &str;
    fn status(&self) -> JobStatus;
    /// Asks the job to stop. The job keeps reporting `Running` until it has.
    fn cancel(&self);
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<dyn BackgroundJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn add(&mut self, job: Arc<dyn BackgroundJob>) {
        debug!(job = job.name(), "job registered");
        self.jobs.push(job);
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Arc<dyn BackgroundJob>> {
        self.jobs.iter()
    }

    pub fn cancel_all(&self) {
        for job in &self.jobs {
            job.cancel();
        }
    }

    /// Drops every job that is no longer running. Returns how many were removed.
    pub fn remove_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| {
            let running = job.status() == JobStatus::Running;
            if !running {
                debug!(job = job.name(), "job removed");
            }
            running
        });
        before - self.jobs.len()
    }

    /// Blocks until the registry is empty.
    ///
    /// With a `timeout`, gives up once it expires and returns the number of
    /// jobs still registered.
    pub fn drain(&mut self, timeout: Option<Duration>) -> Result<(), usize> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            self.remove_finished();
            if self.jobs.is_empty() {
                return Ok(());
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(remaining = self.jobs.len(), "job drain timed out");
                return Err(self.jobs.len());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{BackgroundJob, JobRegistry, JobStatus};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Reports `Running` for `stubborn_polls` status calls after being
    /// cancelled, then `Cancelled`. `None` never stops.
    pub(crate) struct ScriptedJob {
        pub name: String,
        pub status: Mutex<JobStatus>,
        pub cancelled: AtomicBool,
        pub stubborn_polls: Option<usize>,
        pub polls: AtomicUsize,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedJob {
        pub(crate) fn new(
            name: &str,
            status: JobStatus,
            stubborn_polls: Option<usize>,
            log: Arc<Mutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                status: Mutex::new(status),
                cancelled: AtomicBool::new(false),
                stubborn_polls,
                polls: AtomicUsize::new(0),
                log,
            })
        }
    }

    impl BackgroundJob for ScriptedJob {
        fn name(&self) -> &str {
            &self.name
        }

        fn status(&self) -> JobStatus {
            let mut status = self.status.lock();
            if *status == JobStatus::Running && self.cancelled.load(Ordering::SeqCst) {
                let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
                if self.stubborn_polls.is_some_and(|n| polls > n) {
                    *status = JobStatus::Cancelled;
                }
            }
            if *status != JobStatus::Running {
                self.log.lock().push(format!("{} finished", self.name));
            }
            *status
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn finished_jobs_are_removed_running_ones_stay() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut jobs = JobRegistry::new();
        jobs.add(ScriptedJob::new("done", JobStatus::Completed, None, log.clone()));
        jobs.add(ScriptedJob::new("busy", JobStatus::Running, None, log.clone()));
        assert_eq!(jobs.remove_finished(), 1);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.jobs().next().unwrap().name(), "busy");
    }

    #[test]
    fn drain_waits_for_cancelled_jobs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slow = ScriptedJob::new("slow", JobStatus::Running, Some(3), log.clone());
        let mut jobs = JobRegistry::new();
        jobs.add(slow.clone());
        jobs.cancel_all();
        assert_eq!(jobs.drain(None), Ok(()));
        assert!(jobs.is_empty());
        assert_eq!(slow.polls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn drain_gives_up_after_the_timeout() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut jobs = JobRegistry::new();
        jobs.add(ScriptedJob::new("stuck", JobStatus::Running, None, log));
        jobs.cancel_all();
        assert_eq!(jobs.drain(Some(Duration::from_millis(20))), Err(1));
        assert_eq!(jobs.len(), 1);
    }
}
