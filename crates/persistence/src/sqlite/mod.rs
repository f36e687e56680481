//! SQLite persistence module
//!
//! Repository pattern for SQLite database access, plus the
//! [`WalletStore`](crate::WalletStore) built on it.

pub mod repos;
pub mod schema;
pub mod store;

pub use repos::{
    create_pool, init_database, init_schema, table_counts, MovementRepo, UserRepo,
    WpMovementRepo,
};
pub use schema::{MovementRow, UserRow, WpMovementRow, SCHEMA};
pub use store::SqliteWalletStore;
