//! Brite Wallet CLI - Wallet Premium operations from command line
//!
//! Usage:
//! ```bash
//! britewallet init
//! britewallet user create mario Mario Rossi --pack premium --card C-001
//! britewallet movement add mario 1000 --type deposit-added --semester 2022_1
//! britewallet semester show 2022_1
//! britewallet switch semester 2022_1
//! britewallet worker
//! britewallet withdraw <WP_MOVEMENT_ID> 15 --user mario --card C-002
//! britewallet summary user mario
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

mod commands;
mod db;

use britewallet_core::{ClubPack, MovementType, UserRole};
use commands::{semester, user, wallet};

/// Brite Wallet - Wallet Premium engine over SQLite and JSONL task queues
#[derive(Parser)]
#[command(name = "britewallet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/britewallet.db", global = true)]
    pub db: PathBuf,

    /// Task queue directory
    #[arg(long, default_value = "data/queues", global = true)]
    pub queue_dir: PathBuf,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database schema
    Init {
        /// Force re-initialization (drops existing data)
        #[arg(long)]
        force: bool,
    },

    /// Show database and queue status
    Status,

    /// Member management
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Ledger entries
    Movement {
        #[command(subcommand)]
        action: MovementAction,
    },

    /// Semester window arithmetic
    Semester {
        #[command(subcommand)]
        action: SemesterAction,
    },

    /// Enqueue the provisioning of an expired semester
    Switch {
        #[command(subcommand)]
        action: SwitchAction,
    },

    /// Drain the provisioning queue
    Worker,

    /// Withdraw from one monthly record
    Withdraw {
        /// Wallet Premium movement ID
        wp_movement_id: String,
        /// Amount of brites
        amount: Decimal,
        /// Acting user ID
        #[arg(long)]
        user: String,
        /// Transfer to the owner of this club card instead of unlocking
        #[arg(long)]
        card: Option<String>,
    },

    /// Withdraw from the open records of one or more semesters
    WithdrawSemester {
        /// Total amount of brites
        amount: Decimal,
        /// Acting user ID
        #[arg(long)]
        user: String,
        /// Semesters (comma-separated, e.g. 2022_1,2022_2)
        #[arg(long, value_delimiter = ',', required = true)]
        semesters: Vec<String>,
        /// Target user when acting as admin
        #[arg(long)]
        target: Option<String>,
        /// Transfer to the owner of this club card instead of unlocking
        #[arg(long)]
        card: Option<String>,
    },

    /// Wallet Premium summaries
    Summary {
        #[command(subcommand)]
        action: SummaryAction,
    },

    /// Wallet Premium records
    Wp {
        #[command(subcommand)]
        action: WpAction,
    },

    /// Send unlock reminders
    NotifyUnlock {
        /// Users to remind; defaults to everyone with brites pending
        #[arg(long, value_delimiter = ',')]
        users: Option<Vec<String>>,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a member
    Create {
        id: String,
        first_name: String,
        last_name: String,
        #[arg(long, default_value = "premium")]
        pack: ClubPackArg,
        /// Club card number
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Roles (comma-separated, e.g. client,club_admin)
        #[arg(long, value_delimiter = ',')]
        roles: Option<Vec<String>>,
    },
    /// Show a member and their ledger
    Show { id: String },
}

#[derive(Subcommand)]
pub enum MovementAction {
    /// Record a ledger entry
    Add {
        user_id: String,
        amount: Decimal,
        #[arg(long, short = 't')]
        r#type: MovementTypeArg,
        /// Semester ID; defaults to the one containing today
        #[arg(long)]
        semester: Option<String>,
        #[arg(long, default_value = "premium")]
        pack: ClubPackArg,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SemesterAction {
    /// Windows of a semester
    Show { id: String },
    /// Semester containing today
    Current,
    /// Semester before the given one, or before the current one
    Prev { id: Option<String> },
    /// Most recent expired semester
    LastExpired,
    /// Semesters whose Wallet Premium is running
    Valid {
        #[arg(long)]
        years: Option<i32>,
    },
}

#[derive(Subcommand)]
pub enum SwitchAction {
    /// Switch a given expired semester
    Semester {
        id: String,
        /// Restrict to these users (comma-separated)
        #[arg(long, value_delimiter = ',')]
        users: Option<Vec<String>>,
    },
    /// Switch the most recent expired semester
    Last,
}

#[derive(Subcommand)]
pub enum SummaryAction {
    /// Summary of one semester
    Semester {
        id: String,
        #[arg(long)]
        user: String,
        /// Include the records
        #[arg(long)]
        movements: bool,
    },
    /// Summaries of every running semester
    User { id: String },
}

#[derive(Subcommand)]
pub enum WpAction {
    /// Show one record
    Show { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ClubPackArg {
    Basic,
    Premium,
}

impl ClubPackArg {
    pub fn to_core(self) -> ClubPack {
        match self {
            ClubPackArg::Basic => ClubPack::Basic,
            ClubPackArg::Premium => ClubPack::Premium,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MovementTypeArg {
    InterestRecapitalized,
    DepositAdded,
    DepositRemoved,
    DepositTransferred,
    DepositUsed,
}

impl MovementTypeArg {
    pub fn to_core(self) -> MovementType {
        match self {
            MovementTypeArg::InterestRecapitalized => MovementType::InterestRecapitalized,
            MovementTypeArg::DepositAdded => MovementType::DepositAdded,
            MovementTypeArg::DepositRemoved => MovementType::DepositRemoved,
            MovementTypeArg::DepositTransferred => MovementType::DepositTransferred,
            MovementTypeArg::DepositUsed => MovementType::DepositUsed,
        }
    }
}

pub fn parse_roles(roles: Option<Vec<String>>) -> Result<Vec<UserRole>> {
    match roles {
        None => Ok(vec![UserRole::Client]),
        Some(roles) => roles
            .iter()
            .map(|r| UserRole::from_str(r).ok_or_else(|| anyhow::anyhow!("Unknown role: {}", r)))
            .collect(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Ensure data directories exist
    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::create_dir_all(&cli.queue_dir).ok();

    let config = db::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { force } => {
            db::init_database(&cli.db, &cli.queue_dir, force).await?;
            println!("✅ Database initialized at {:?}", cli.db);
        }

        Commands::Status => {
            db::show_status(&cli.db, &cli.queue_dir).await?;
        }

        Commands::Semester { action } => {
            semester::handle(action, &config, cli.json)?;
        }

        command => {
            let database = db::connect(&cli.db, &cli.queue_dir).await?;
            let ctx = britewallet_business::ServiceContext::from_database(&database, config);

            let result = match command {
                Commands::User { action } => user::handle(&ctx, action, cli.json).await,
                Commands::Movement { action } => user::handle_movement(&ctx, action, cli.json).await,
                Commands::Switch { action } => wallet::switch(&ctx, action, cli.json).await,
                Commands::Worker => wallet::work(&ctx, &database, cli.json).await,
                Commands::Withdraw {
                    wp_movement_id,
                    amount,
                    user,
                    card,
                } => wallet::withdraw(&ctx, &wp_movement_id, amount, &user, card.as_deref(), cli.json).await,
                Commands::WithdrawSemester {
                    amount,
                    user,
                    semesters,
                    target,
                    card,
                } => {
                    wallet::withdraw_semester(
                        &ctx,
                        amount,
                        &user,
                        &semesters,
                        target.as_deref(),
                        card.as_deref(),
                        cli.json,
                    )
                    .await
                }
                Commands::Summary { action } => wallet::summary(&ctx, action, cli.json).await,
                Commands::Wp { action } => wallet::wp(&ctx, action, cli.json).await,
                Commands::NotifyUnlock { users } => wallet::notify_unlock(&ctx, users, cli.json).await,
                Commands::Init { .. } | Commands::Status | Commands::Semester { .. } => Ok(()),
            };

            database.close().await;
            result?;
        }
    }

    Ok(())
}
