use std::sync::Arc;

use tokio::{
    select,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use uuid::Uuid;

use crate::{ExitReceiver, scheduler::RefillScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCommand {
    RefillAll,
    RefillSession { session_id: Uuid },
}

/// Cloneable handle for submitting background jobs.
#[derive(Debug, Clone)]
pub struct Jobs {
    tx: UnboundedSender<JobCommand>,
}

impl Jobs {
    pub fn new(tx: UnboundedSender<JobCommand>) -> Self {
        Self { tx }
    }

    pub fn refill_all(&self) {
        self.submit(JobCommand::RefillAll);
    }

    pub fn refill_session(&self, session_id: Uuid) {
        self.submit(JobCommand::RefillSession { session_id });
    }

    fn submit(&self, command: JobCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Job worker is gone, dropping {command:?}");
        }
    }
}

pub struct JobWorker {
    scheduler: Arc<RefillScheduler>,
    rx: UnboundedReceiver<JobCommand>,
}

/// Creates a job handle and the worker that consumes it.
pub fn channel(scheduler: Arc<RefillScheduler>) -> (Jobs, JobWorker) {
    let (tx, rx) = unbounded_channel();
    (Jobs::new(tx), JobWorker { scheduler, rx })
}

impl JobWorker {
    /// Runs until the exit signal fires or every handle is dropped. Each job
    /// runs on its own task.
    pub async fn run(mut self, mut exit_receiver: ExitReceiver) {
        loop {
            select! {
                command = self.rx.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("All job handles dropped, stopping worker");
                        break;
                    };
                    self.spawn(command);
                }
                Ok(exit) = exit_receiver.recv() => {
                    if exit {
                        break;
                    }
                }
            }
        }
    }

    fn spawn(&self, command: JobCommand) {
        let scheduler = self.scheduler.clone();

        tokio::spawn(async move {
            match command {
                JobCommand::RefillAll => match scheduler.tick().await {
                    Ok(summary) => tracing::info!(
                        "Refilled {} sessions: {} tracks appended, {} abandoned, {} failed",
                        summary.sessions,
                        summary.appended,
                        summary.abandoned,
                        summary.failed
                    ),
                    Err(error) => tracing::error!("Refill tick failed: {error}"),
                },
                JobCommand::RefillSession { session_id } => {
                    match scheduler.refill_by_id(session_id).await {
                        Ok(Some(outcome)) => {
                            tracing::info!("Refilled session {session_id}: {outcome:?}")
                        }
                        Ok(None) => tracing::debug!("Session {session_id} is not open"),
                        Err(error) => {
                            tracing::error!("Refill of session {session_id} failed: {error}")
                        }
                    }
                }
            }
        });
    }
}
