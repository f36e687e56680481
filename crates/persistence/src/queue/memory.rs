//! In-memory task queue for tests.

use super::TaskDispatcher;
use crate::error::{PersistenceError, PersistenceResult};
use async_trait::async_trait;
use britewallet_core::{Task, TaskEnvelope};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<Vec<TaskEnvelope>>,
    /// Queues whose enqueue always fails
    failing: Mutex<HashSet<String>>,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks_guard(&self) -> PersistenceResult<MutexGuard<'_, Vec<TaskEnvelope>>> {
        self.tasks
            .lock()
            .map_err(|_| PersistenceError::Other("task queue lock poisoned".to_string()))
    }

    /// Make every enqueue onto `queue` fail
    pub fn fail_queue(&self, queue: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(queue.to_string());
        }
    }

    /// Tasks on `queue`, oldest first
    pub fn tasks(&self, queue: &str) -> Vec<TaskEnvelope> {
        self.tasks_guard()
            .map(|tasks| tasks.iter().filter(|t| t.queue == queue).cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return the tasks on `queue`
    pub fn take(&self, queue: &str) -> Vec<TaskEnvelope> {
        match self.tasks_guard() {
            Ok(mut tasks) => {
                let (taken, kept) = tasks.drain(..).partition(|t| t.queue == queue);
                *tasks = kept;
                taken
            }
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl TaskDispatcher for MemoryTaskQueue {
    async fn enqueue(&self, task: Task, queue: &str) -> PersistenceResult<TaskEnvelope> {
        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(queue))
            .unwrap_or(false);
        if failing {
            return Err(PersistenceError::Other(format!("queue {} is unavailable", queue)));
        }

        let envelope = TaskEnvelope::new(task, queue, Utc::now());
        self.tasks_guard()?.push(envelope.clone());
        Ok(envelope)
    }
}
