// src/runner.rs

use crate::error::Result;
use crate::model::RepositoryIdentity;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How jobs are scheduled against the remote source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// One job at a time, sleeping `pause` between consecutive jobs
    Sequential { pause: Duration },
    /// Up to `workers` jobs in flight; results arrive in completion order
    Pool { workers: usize },
}

/// Result of one job. `Err` carries the message of a panic raised inside the job.
pub type JobOutcome<T> = std::result::Result<T, String>;

/// Drives a per-repository job over a set of identities
#[derive(Debug, Clone)]
pub struct BatchRunner {
    schedule: Schedule,
    label: String,
}

impl BatchRunner {
    pub fn new(schedule: Schedule, label: impl Into<String>) -> Self {
        Self {
            schedule,
            label: label.into(),
        }
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Runs `job` once per identity and hands every outcome to `collect` on the
    /// calling thread. Only worker pool construction can fail.
    pub fn run<T, J, C>(&self, jobs: &[RepositoryIdentity], job: J, mut collect: C) -> Result<()>
    where
        T: Send,
        J: Fn(&RepositoryIdentity) -> T + Sync,
        C: FnMut(&RepositoryIdentity, JobOutcome<T>),
    {
        let bar = ProgressBar::new(jobs.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(self.label.clone());

        match self.schedule {
            Schedule::Sequential { pause } => {
                for (i, identity) in jobs.iter().enumerate() {
                    if i > 0 && !pause.is_zero() {
                        thread::sleep(pause);
                    }
                    collect(identity, guarded(&job, identity));
                    bar.inc(1);
                }
            }
            Schedule::Pool { workers } => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(workers.max(1))
                    .thread_name(|i| format!("repo-worker-{i}"))
                    .build()?;
                let (tx, rx) = mpsc::channel::<(usize, JobOutcome<T>)>();
                let job = &job;
                pool.in_place_scope(|scope| {
                    for (i, identity) in jobs.iter().enumerate() {
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            // the receiver lives until every sender is gone
                            let _ = tx.send((i, guarded(job, identity)));
                        });
                    }
                    drop(tx);
                    for (i, outcome) in rx {
                        collect(&jobs[i], outcome);
                        bar.inc(1);
                    }
                });
            }
        }

        bar.finish_with_message(format!("{} done", self.label));
        Ok(())
    }
}

fn guarded<T, J>(job: &J, identity: &RepositoryIdentity) -> JobOutcome<T>
where
    J: Fn(&RepositoryIdentity) -> T,
{
    panic::catch_unwind(AssertUnwindSafe(|| job(identity))).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(repo = %identity, %message, "job panicked");
        message
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
