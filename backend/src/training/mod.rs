//! Background training runs.
//!
//! `POST /train` hands the external training command to [`TrainingService`],
//! which runs it as a child process on the async runtime and records the
//! outcome in an in-memory job table that `GET /train/{id}` reads from.

use log::{debug, error, info, warn};
use shared::{JobStatus, TrainingJob};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("Training job {} is already {}", .0.id, .0.status)]
    AlreadyRunning(Box<TrainingJob>),
    #[error("Training job not found: {0}")]
    NotFound(Uuid),
    #[error("Training command is empty")]
    EmptyCommand,
}

/// Number of jobs remembered by default; older finished jobs are dropped.
pub const DEFAULT_JOB_HISTORY: usize = 50;

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, TrainingJob>,
    order: VecDeque<Uuid>,
}

impl JobTable {
    fn insert(&mut self, job: TrainingJob) {
        self.order.push_back(job.id);
        self.jobs.insert(job.id, job);
    }

    /// Drops the oldest finished jobs until at most `keep` remain. Active
    /// jobs are never dropped.
    fn prune(&mut self, keep: usize) {
        while self.jobs.len() > keep {
            let oldest_finished = self
                .order
                .iter()
                .position(|id| self.jobs.get(id).is_some_and(|job| !job.is_active()));
            let Some(id) = oldest_finished.and_then(|pos| self.order.remove(pos)) else {
                break;
            };
            self.jobs.remove(&id);
            debug!("Evicted training job {}", id);
        }
    }
}

#[derive(Clone)]
pub struct TrainingService {
    program: String,
    args: Vec<String>,
    history: usize,
    jobs: Arc<RwLock<JobTable>>,
}

impl TrainingService {
    /// `command` is split on whitespace into a program and its arguments; it
    /// is not passed through a shell.
    pub fn new(command: &str) -> Result<Self, TrainingError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(TrainingError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            history: DEFAULT_JOB_HISTORY,
            jobs: Arc::new(RwLock::new(JobTable::default())),
        })
    }

    /// Caps how many jobs `get` can still report on; at least one is kept.
    pub fn with_job_history(mut self, keep: usize) -> Self {
        self.history = keep.max(1);
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Registers a new job and starts the training process in the background.
    /// Only one run may be pending or running at a time.
    pub async fn start(&self) -> Result<TrainingJob, TrainingError> {
        let job = {
            let mut jobs = self.jobs.write().await;
            if let Some(active) = jobs.jobs.values().find(|job| job.is_active()) {
                warn!("Rejecting training request, job {} is {}", active.id, active.status);
                return Err(TrainingError::AlreadyRunning(Box::new(active.clone())));
            }
            let job = TrainingJob::new(self.command_line());
            jobs.insert(job.clone());
            jobs.prune(self.history);
            job
        };
        info!("Created training job {}: {}", job.id, job.command);

        let service = self.clone();
        let job_id = job.id;
        actix_web::rt::spawn(async move {
            service.run(job_id).await;
        });

        Ok(job)
    }

    pub async fn get(&self, job_id: Uuid) -> Result<TrainingJob, TrainingError> {
        self.jobs
            .read()
            .await
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(TrainingError::NotFound(job_id))
    }

    async fn run(&self, job_id: Uuid) {
        self.update(job_id, |job| job.set_status(JobStatus::Running)).await;
        info!("Training job {} running", job_id);

        match Command::new(&self.program).args(&self.args).status().await {
            Ok(status) => {
                let code = status.code();
                self.update(job_id, |job| job.set_finished(code)).await;
                if status.success() {
                    info!("Training job {} completed", job_id);
                } else {
                    error!("Training job {} failed: {}", job_id, status);
                }
            }
            Err(e) => {
                error!("Training job {} could not start {}: {}", job_id, self.program, e);
                self.update(job_id, |job| {
                    job.set_error(format!("failed to start training process: {}", e))
                })
                .await;
            }
        }
    }

    async fn update<F>(&self, job_id: Uuid, apply: F)
    where
        F: FnOnce(&mut TrainingJob),
    {
        match self.jobs.write().await.jobs.get_mut(&job_id) {
            Some(job) => apply(job),
            None => error!("Training job {} vanished from the registry", job_id),
        }
    }
}
