//! Database initialization, status and configuration loading

use anyhow::{Context, Result};
use britewallet_business::WalletConfig;
use britewallet_persistence::sqlite::table_counts;
use britewallet_persistence::Database;
use std::path::Path;

fn database_url(db_path: &Path) -> String {
    format!("sqlite:{}?mode=rwc", db_path.display())
}

/// Defaults, or the given JSON file
pub fn load_config(path: Option<&Path>) -> Result<WalletConfig> {
    match path {
        Some(path) => WalletConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => Ok(WalletConfig::default()),
    }
}

/// Initialize the database with schema
pub async fn init_database(db_path: &Path, queue_dir: &Path, force: bool) -> Result<()> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("🗑️  Removed existing database");
    }

    println!("📦 Creating schema...");
    let database = Database::new(&database_url(db_path), queue_dir)
        .await
        .context("Failed to initialize database")?;
    database.close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path, queue_dir: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'britewallet init' to create the database");
        return Ok(());
    }

    let database = connect(db_path, queue_dir).await?;

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();

    for (table, count) in table_counts(database.pool()).await? {
        println!("   {:<14} {}", format!("{}:", table), count);
    }

    let queue = database.queue();
    let queues = queue.list_queues()?;
    if !queues.is_empty() {
        println!();
        println!("📬 Queues ({:?})", queue.base_path());
        for name in queues {
            println!("   {:<14} {}", format!("{}:", name), queue.read_queue(&name)?.len());
        }
    }

    database.close().await;
    Ok(())
}

/// Open the database and queue directory
pub async fn connect(db_path: &Path, queue_dir: &Path) -> Result<Database> {
    Database::new(&database_url(db_path), queue_dir)
        .await
        .context("Failed to connect to database. Run 'britewallet init' first.")
}
