//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for professionals, leads and auth state.

mod repository;
mod store;

pub use repository::*;
pub use store::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::models::SENTINEL_PROFESSIONAL_ID;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash BLOB NOT NULL,
            password_salt BLOB NOT NULL,
            password_iterations INTEGER NOT NULL,
            email_confirmed_at TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_sessions (
            token_hash BLOB PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES auth_users(id) ON DELETE CASCADE,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Single-use tokens for email confirmation and password recovery
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_tokens (
            token_hash BLOB PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES auth_users(id) ON DELETE CASCADE,
            purpose TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS professionals (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            oab_number TEXT NOT NULL,
            specialty TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            subscription_active INTEGER NOT NULL DEFAULT 0,
            plan TEXT NOT NULL DEFAULT 'none',
            role TEXT NOT NULL DEFAULT 'professional',
            phone TEXT,
            gender TEXT,
            bio TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS professional_specialties (
            professional_id TEXT NOT NULL REFERENCES professionals(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            PRIMARY KEY (professional_id, tag)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            professional_id TEXT NOT NULL REFERENCES professionals(id),
            client_name TEXT NOT NULL,
            client_email TEXT,
            client_phone TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            is_relevant INTEGER,
            quality_rating INTEGER,
            feedback_comment TEXT,
            submission_id TEXT UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // The unassigned queue owner. No phone, never approved: never eligible.
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO professionals
            (id, email, name, oab_number, specialty, status, subscription_active, plan, role, created_at, updated_at)
        VALUES (?, 'unassigned@lexmatch.invalid', 'Fila administrativa', '', '', 'rejected', 0, 'none', 'professional',
                '1970-01-01T00:00:00.000000Z', '1970-01-01T00:00:00.000000Z')
        "#,
    )
    .bind(SENTINEL_PROFESSIONAL_ID)
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_professionals_status ON professionals(status, subscription_active);
        CREATE INDEX IF NOT EXISTS idx_professionals_created_at ON professionals(created_at);
        CREATE INDEX IF NOT EXISTS idx_leads_professional ON leads(professional_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_auth_sessions_user ON auth_sessions(user_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
