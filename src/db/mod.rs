//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for rides, vehicles and the status ledger.
//! It has no `SELECT ... FOR UPDATE`; every claim that must be exclusive is a
//! single write statement issued first in its transaction, so the database
//! write lock is held before any candidate row is read.

mod coordinates;
mod dispatch;
mod ledger;
mod notification;
mod repository;
mod vacancy;

pub use dispatch::*;
pub use repository::*;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Current time as epoch microseconds, the unit of every stored timestamp.
pub(crate) fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS owners (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            access_token TEXT NOT NULL UNIQUE,
            chair_register_token TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            firstname TEXT NOT NULL,
            lastname TEXT NOT NULL,
            access_token TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chairs (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL REFERENCES owners(id),
            name TEXT NOT NULL,
            model TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            access_token TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chair_locations (
            id TEXT PRIMARY KEY,
            chair_id TEXT NOT NULL REFERENCES chairs(id),
            latitude INTEGER NOT NULL,
            longitude INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rides (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            chair_id TEXT REFERENCES chairs(id),
            pickup_latitude INTEGER NOT NULL,
            pickup_longitude INTEGER NOT NULL,
            destination_latitude INTEGER NOT NULL,
            destination_longitude INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ride_statuses (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            ride_id TEXT NOT NULL REFERENCES rides(id),
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            chair_sent_at INTEGER
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chair_vacancies (
            chair_id TEXT PRIMARY KEY REFERENCES chairs(id),
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Latest ledger entry per ride. `seq` is assigned under the write lock, so
    // append order decides; `created_at` is taken before the lock is acquired.
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS ride_latest_status AS
        SELECT r.id AS ride_id,
               r.user_id AS user_id,
               r.chair_id AS chair_id,
               (SELECT rs.status FROM ride_statuses rs
                WHERE rs.ride_id = r.id
                ORDER BY rs.seq DESC
                LIMIT 1) AS status
        FROM rides r;
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_chair_locations_chair ON chair_locations(chair_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_rides_waiting ON rides(chair_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_rides_user ON rides(user_id);
        CREATE INDEX IF NOT EXISTS idx_ride_statuses_ride ON ride_statuses(ride_id, seq);
        CREATE INDEX IF NOT EXISTS idx_ride_statuses_undelivered ON ride_statuses(ride_id, chair_sent_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
