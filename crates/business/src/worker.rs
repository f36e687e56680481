//! Consumer of the provisioning queue

use crate::error::BusinessResult;
use crate::provisioning::{ProvisionOutcome, ProvisioningService};
use crate::services::ServiceContext;
use britewallet_core::{PremiumAggregate, Task, TaskEnvelope};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// What handling one task did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskOutcome {
    Provisioned(ProvisionOutcome),
    /// Notification passed on to the notification queue
    Forwarded { task_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerReport {
    pub provisioned: Vec<ProvisionOutcome>,
    pub forwarded: usize,
    /// Ids of the tasks put back on their queue after a storage failure
    pub requeued: Vec<String>,
    /// Ids of the tasks given up on
    pub failed: Vec<String>,
}

pub struct ProvisioningWorker<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ProvisioningWorker<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, envelope: TaskEnvelope) -> BusinessResult<TaskOutcome> {
        match envelope.task {
            Task::AddBritesToPremiumWallet(aggregate) => self
                .provision_with_retry(&envelope.id, &aggregate)
                .await
                .map(TaskOutcome::Provisioned),
            Task::CreateNotification(notification) => {
                let queue = &self.ctx.config().notification_queue;
                let forwarded = self
                    .ctx
                    .tasks()
                    .enqueue(Task::CreateNotification(notification), queue)
                    .await?;
                Ok(TaskOutcome::Forwarded { task_id: forwarded.id })
            }
        }
    }

    /// Business rejections fail at once; storage failures and conflicts
    /// are retried up to `max_task_attempts` times
    async fn provision_with_retry(&self, task_id: &str, aggregate: &PremiumAggregate) -> BusinessResult<ProvisionOutcome> {
        let config = self.ctx.config();
        let provisioning = ProvisioningService::new(self.ctx);
        let mut attempt = 1;

        loop {
            match provisioning.provision_aggregate(aggregate).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < config.max_task_attempts => {
                    warn!(task_id, attempt, error = %e, "Provisioning failed, retrying");
                    tokio::time::sleep(Duration::from_millis(config.retry_backoff_ms * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Handle every envelope in order; a failing task does not stop the rest.
    ///
    /// A task still failing with a storage error or conflict after its
    /// attempts goes back on its queue for the next drain. Business
    /// rejections are dropped.
    pub async fn drain(&self, envelopes: Vec<TaskEnvelope>) -> WorkerReport {
        let mut report = WorkerReport::default();

        for envelope in envelopes {
            let task_id = envelope.id.clone();
            let queue = envelope.queue.clone();
            let task = envelope.task.clone();
            let name = task.name();

            match self.handle(envelope).await {
                Ok(TaskOutcome::Provisioned(outcome)) => report.provisioned.push(outcome),
                Ok(TaskOutcome::Forwarded { .. }) => report.forwarded += 1,
                Err(e) if e.is_retryable() => match self.ctx.tasks().enqueue(task, &queue).await {
                    Ok(requeued) => {
                        warn!(task_id = %task_id, requeued_as = %requeued.id, queue = %queue, error = %e, "Task requeued");
                        report.requeued.push(task_id);
                    }
                    Err(requeue_error) => {
                        error!(task_id = %task_id, task = name, error = %e, %requeue_error, "Task failed and could not be requeued");
                        report.failed.push(task_id);
                    }
                },
                Err(e) => {
                    error!(task_id = %task_id, task = name, kind = ?e.kind(), error = %e, "Task failed");
                    report.failed.push(task_id);
                }
            }
        }

        info!(
            provisioned = report.provisioned.len(),
            forwarded = report.forwarded,
            requeued = report.requeued.len(),
            failed = report.failed.len(),
            "Queue drained"
        );
        report
    }
}
