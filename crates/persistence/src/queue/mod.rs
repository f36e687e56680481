//! Task dispatch: the [`TaskDispatcher`] collaborator and its
//! implementations.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlTaskQueue;
pub use memory::MemoryTaskQueue;

use crate::error::PersistenceResult;
use async_trait::async_trait;
use britewallet_core::{Task, TaskEnvelope};

/// Fire-and-forget, at-least-once task dispatch
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Put `task` on `queue`
    async fn enqueue(&self, task: Task, queue: &str) -> PersistenceResult<TaskEnvelope>;
}
