//! # Brite Wallet Business
//!
//! Business logic layer - ledger aggregation, Wallet Premium provisioning,
//! withdrawals, summaries and the scheduled recapitalization jobs.
//!
//! Every service borrows a [`ServiceContext`] holding the storage and
//! task-dispatch collaborators, a clock and the [`WalletConfig`].

pub mod aggregator;
pub mod config;
pub mod error;
pub mod notification;
pub mod provisioning;
pub mod recapitalization;
pub mod services;
pub mod summary;
pub mod withdrawal;
pub mod worker;

pub use aggregator::LedgerAggregator;
pub use config::WalletConfig;
pub use error::{BusinessError, BusinessResult, ErrorKind};
pub use notification::NotificationService;
pub use provisioning::{ProvisionOutcome, ProvisionStatus, ProvisioningService};
pub use recapitalization::{NotifyReport, RecapitalizationService, SwitchReport};
pub use services::ServiceContext;
pub use summary::{SemesterSummary, SummaryService};
pub use withdrawal::WithdrawalService;
pub use worker::{ProvisioningWorker, TaskOutcome, WorkerReport};
