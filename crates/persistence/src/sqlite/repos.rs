//! Repository implementations for SQLite
//!
//! Queries for the users, movements and wp_movements tables. Functions that
//! must share a transaction take a `SqliteConnection`.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use britewallet_core::{Movement, SemesterId, User, WpMovement};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the users table
pub struct UserRepo;

impl UserRepo {
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> PersistenceResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn get_by_card(pool: &SqlitePool, card_number: &str) -> PersistenceResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE club_card_number = ?")
            .bind(card_number)
            .fetch_optional(pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn insert(pool: &SqlitePool, user: &User) -> PersistenceResult<()> {
        let row = UserRow::try_from(user)?;
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, club_pack, club_card_number, roles, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.club_pack)
        .bind(&row.club_card_number)
        .bind(&row.roles)
        .bind(row.created_at)
        .execute(pool)
        .await
        .map_err(|e| unique_to_exists(e, "User", &user.id))?;
        Ok(())
    }

    pub async fn get_all(pool: &SqlitePool) -> PersistenceResult<Vec<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY last_name, first_name")
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}

// ============================================================================
// Movement Repository
// ============================================================================

/// Repository for the movements table (the ledger)
pub struct MovementRepo;

impl MovementRepo {
    pub async fn insert(pool: &SqlitePool, movement: &Movement) -> PersistenceResult<()> {
        let row = MovementRow::from(movement);
        sqlx::query(
            r#"
            INSERT INTO movements (id, user_id, amount_change, movement_type, semester_id, club_pack,
                                   created_by, notes, usable_from, expires_at, reference_year,
                                   reference_semester, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.amount_change)
        .bind(&row.movement_type)
        .bind(&row.semester_id)
        .bind(&row.club_pack)
        .bind(&row.created_by)
        .bind(&row.notes)
        .bind(row.usable_from)
        .bind(row.expires_at)
        .bind(row.reference_year)
        .bind(row.reference_semester)
        .bind(row.created_at)
        .execute(pool)
        .await
        .map_err(|e| unique_to_exists(e, "Movement", &movement.id))?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> PersistenceResult<()> {
        let result = sqlx::query("DELETE FROM movements WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Movement", id));
        }
        Ok(())
    }

    pub async fn get_by_user(pool: &SqlitePool, user_id: &str) -> PersistenceResult<Vec<Movement>> {
        sqlx::query_as::<_, MovementRow>(
            "SELECT * FROM movements WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Movement::try_from)
        .collect()
    }

    /// Premium IN/OUT entries of a semester, optionally limited to some
    /// users, read on the caller's connection so the aggregation can run
    /// inside one transaction.
    ///
    /// Amounts are stored as TEXT, so the IN/OUT sums are computed in Rust
    /// with `Decimal` rather than with SQL `SUM`.
    pub async fn premium_entries(
        conn: &mut SqliteConnection,
        semester: SemesterId,
        user_ids: Option<&HashSet<String>>,
    ) -> PersistenceResult<Vec<Movement>> {
        if user_ids.is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM movements WHERE semester_id = ");
        query.push_bind(semester.to_string());
        query.push(
            " AND club_pack = 'premium' AND movement_type IN ('interest_recapitalized', 'deposit_added', \
             'deposit_removed', 'deposit_transferred', 'deposit_used')",
        );
        if let Some(ids) = user_ids {
            query.push(" AND user_id IN (");
            let mut separated = query.separated(", ");
            for id in ids {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");
        }

        query
            .build_query_as::<MovementRow>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Movement::try_from)
            .collect()
    }
}

// ============================================================================
// Wallet Premium Repository
// ============================================================================

/// Repository for the wp_movements table
pub struct WpMovementRepo;

impl WpMovementRepo {
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> PersistenceResult<Option<WpMovement>> {
        sqlx::query_as::<_, WpMovementRow>("SELECT * FROM wp_movements WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(WpMovement::try_from)
            .transpose()
    }

    pub async fn get_by_user_semester(
        pool: &SqlitePool,
        user_id: &str,
        semester: SemesterId,
    ) -> PersistenceResult<Vec<WpMovement>> {
        sqlx::query_as::<_, WpMovementRow>(
            r#"
            SELECT * FROM wp_movements
            WHERE user_id = ? AND semester = ?
            ORDER BY CASE movement_type WHEN 'initial_deposit' THEN 0 ELSE 1 END, withdrawable_from
            "#,
        )
        .bind(user_id)
        .bind(semester.to_string())
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(WpMovement::try_from)
        .collect()
    }

    /// Monthly records not yet exhausted, optionally for one user.
    /// Window checks are left to the caller.
    pub async fn get_open_monthly(
        pool: &SqlitePool,
        user_id: Option<&str>,
    ) -> PersistenceResult<Vec<WpMovement>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, WpMovementRow>(
                    r#"
                    SELECT * FROM wp_movements
                    WHERE movement_type = 'monthly_income' AND withdrawal_date IS NULL AND user_id = ?
                    ORDER BY semester, withdrawable_from
                    "#,
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WpMovementRow>(
                    r#"
                    SELECT * FROM wp_movements
                    WHERE movement_type = 'monthly_income' AND withdrawal_date IS NULL
                    ORDER BY user_id, semester, withdrawable_from
                    "#,
                )
                .fetch_all(pool)
                .await?
            }
        };

        rows.into_iter().map(WpMovement::try_from).collect()
    }

    pub async fn initial_deposit_exists(
        conn: &mut SqliteConnection,
        user_id: &str,
        semester: SemesterId,
    ) -> PersistenceResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM wp_movements WHERE user_id = ? AND semester = ? AND movement_type = 'initial_deposit'",
        )
        .bind(user_id)
        .bind(semester.to_string())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0 > 0)
    }

    pub async fn insert(conn: &mut SqliteConnection, wp: &WpMovement) -> PersistenceResult<()> {
        let row = WpMovementRow::try_from(wp)?;
        sqlx::query(
            r#"
            INSERT INTO wp_movements (id, user_id, movement_type, semester, reference_semester,
                                      reference_year, reference_usable_until, initial_amount,
                                      income_amount, income_percentage, withdrawable_from,
                                      withdrawable_until, withdrawal_remaining, withdrawal_date,
                                      withdrawal_movements, version, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.movement_type)
        .bind(&row.semester)
        .bind(row.reference_semester)
        .bind(row.reference_year)
        .bind(row.reference_usable_until)
        .bind(&row.initial_amount)
        .bind(&row.income_amount)
        .bind(row.income_percentage)
        .bind(row.withdrawable_from)
        .bind(row.withdrawable_until)
        .bind(&row.withdrawal_remaining)
        .bind(row.withdrawal_date)
        .bind(&row.withdrawal_movements)
        .bind(row.version)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| unique_to_exists(e, "WpMovement", &format!("{}/{}", wp.user_id, wp.semester)))?;
        Ok(())
    }

    /// Write the withdrawal fields if the stored version still matches
    pub async fn update_versioned(pool: &SqlitePool, wp: &WpMovement) -> PersistenceResult<()> {
        let row = WpMovementRow::try_from(wp)?;
        let result = sqlx::query(
            r#"
            UPDATE wp_movements
            SET withdrawal_remaining = ?, withdrawal_date = ?, withdrawal_movements = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&row.withdrawal_remaining)
        .bind(row.withdrawal_date)
        .bind(&row.withdrawal_movements)
        .bind(&row.id)
        .bind(row.version)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return match Self::get_by_id(pool, &wp.id).await? {
                Some(_) => Err(PersistenceError::version_conflict("WpMovement", &wp.id, wp.version)),
                None => Err(PersistenceError::not_found("WpMovement", &wp.id)),
            };
        }
        Ok(())
    }
}

// ============================================================================
// Counts
// ============================================================================

/// Row counts per table, for status output
pub async fn table_counts(pool: &SqlitePool) -> PersistenceResult<Vec<(&'static str, i64)>> {
    let mut counts = Vec::new();
    for table in ["users", "movements", "wp_movements"] {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        counts.push((table, row.0));
    }
    Ok(counts)
}

fn unique_to_exists(error: sqlx::Error, entity: &str, id: &str) -> PersistenceError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PersistenceError::already_exists(entity, id)
        }
        _ => PersistenceError::Database(error),
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Open a pool on an existing database
pub async fn create_pool(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = SqlitePool::connect(database_url).await?;
    Ok(pool)
}

/// Create tables and indexes when missing
pub async fn init_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Open (creating if missing) a database and make sure the schema exists
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    // An in-memory database lives and dies with its single connection
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    init_schema(&pool).await?;
    Ok(pool)
}
