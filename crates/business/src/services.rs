//! Service context shared by every business service
//!
//! Bundles the storage, task-dispatch and clock collaborators with the
//! configuration.

use crate::config::WalletConfig;
use britewallet_core::{Clock, SystemClock};
use britewallet_persistence::{Database, TaskDispatcher, WalletStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Context for business operations
#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn WalletStore>,
    tasks: Arc<dyn TaskDispatcher>,
    clock: Arc<dyn Clock>,
    config: WalletConfig,
}

impl ServiceContext {
    /// Create from collaborators directly
    pub fn new(
        store: Arc<dyn WalletStore>,
        tasks: Arc<dyn TaskDispatcher>,
        clock: Arc<dyn Clock>,
        config: WalletConfig,
    ) -> Self {
        Self {
            store,
            tasks,
            clock,
            config,
        }
    }

    /// SQLite store, JSONL queue and the system clock
    pub fn from_database(db: &Database, config: WalletConfig) -> Self {
        Self::new(db.store(), db.queue(), Arc::new(SystemClock), config)
    }

    pub fn store(&self) -> &dyn WalletStore {
        self.store.as_ref()
    }

    pub fn tasks(&self) -> &dyn TaskDispatcher {
        self.tasks.as_ref()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
