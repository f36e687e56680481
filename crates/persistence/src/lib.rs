//! # Britewallet Persistence
//!
//! Storage and task-dispatch collaborators for the Wallet Premium engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Database                               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐  │
//! │  │   SQLite    │    │    JSONL    │    │     Repos       │  │
//! │  │  (records)  │    │   (tasks)   │    │   (queries)     │  │
//! │  └─────────────┘    └─────────────┘    └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Services only see the [`WalletStore`] and [`TaskDispatcher`] traits;
//! [`MemoryWalletStore`] and [`MemoryTaskQueue`] stand in for tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use britewallet_persistence::Database;
//!
//! let db = Database::new("sqlite:britewallet.db?mode=rwc", "data/queues").await?;
//! let store = db.store();
//! let user = store.find_user("u1").await?;
//! ```

pub mod error;
pub mod memory;
pub mod queue;
pub mod sqlite;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use memory::MemoryWalletStore;
pub use queue::{JsonlTaskQueue, MemoryTaskQueue, TaskDispatcher};
pub use sqlite::{
    init_database, init_schema, MovementRepo, SqliteWalletStore, UserRepo, WpMovementRepo,
};
pub use store::WalletStore;

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

/// Database facade - SQLite records plus the JSONL task queue
pub struct Database {
    pool: SqlitePool,
    queue: Arc<JsonlTaskQueue>,
}

impl Database {
    /// Open the database (creating it and its schema if missing) and the
    /// queue directory
    ///
    /// # Arguments
    /// * `db_url` - SQLite database URL (e.g., "sqlite:britewallet.db?mode=rwc")
    /// * `queue_path` - Directory holding the JSONL queue files
    pub async fn new<Q: AsRef<Path>>(db_url: &str, queue_path: Q) -> PersistenceResult<Self> {
        let pool = init_database(db_url).await?;
        let queue = Arc::new(JsonlTaskQueue::new(queue_path)?);

        Ok(Self { pool, queue })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn store(&self) -> Arc<SqliteWalletStore> {
        Arc::new(SqliteWalletStore::new(self.pool.clone()))
    }

    pub fn queue(&self) -> Arc<JsonlTaskQueue> {
        Arc::clone(&self.queue)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
