//! Table creation and ad hoc column upgrades for databases written by
//! older builds.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::Result;

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY,
        nickname TEXT NOT NULL UNIQUE,
        real_name TEXT NOT NULL,
        phone TEXT,
        category TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        points INTEGER NOT NULL DEFAULT 0,
        participations INTEGER NOT NULL DEFAULT 0,
        photo_path TEXT,
        referrer INTEGER,
        registered_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS points_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nickname TEXT NOT NULL,
        points INTEGER NOT NULL,
        note TEXT NOT NULL,
        granted_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_points_history_nickname ON points_history(nickname)",
    "CREATE TABLE IF NOT EXISTS events (
        name TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS user_invites (
        user_id INTEGER PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS registration_drafts (
        user_id INTEGER PRIMARY KEY,
        nickname TEXT NOT NULL,
        real_name TEXT NOT NULL,
        phone TEXT,
        referrer INTEGER,
        created_at TEXT NOT NULL
    )",
];

/// Create missing tables and add columns that older `users` tables lack
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }

    let columns = table_columns(pool, "users").await?;

    if !columns.iter().any(|c| c == "referrer") {
        info!("Adding users.referrer column");
        sqlx::query("ALTER TABLE users ADD COLUMN referrer INTEGER")
            .execute(pool)
            .await?;
    }

    if !columns.iter().any(|c| c == "registered_at") {
        info!("Adding users.registered_at column");
        sqlx::query("ALTER TABLE users ADD COLUMN registered_at TEXT")
            .execute(pool)
            .await?;
        sqlx::query("UPDATE users SET registered_at = ? WHERE registered_at IS NULL")
            .bind(Utc::now())
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        columns.push(row.try_get::<String, _>("name")?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn bare_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = bare_pool().await;
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let columns = table_columns(&pool, "users").await.unwrap();
        assert!(columns.contains(&"referrer".to_string()));
        assert!(columns.contains(&"registered_at".to_string()));
    }

    #[tokio::test]
    async fn test_legacy_users_table_is_upgraded() {
        let pool = bare_pool().await;
        sqlx::query(
            "CREATE TABLE users (
                user_id INTEGER PRIMARY KEY,
                nickname TEXT UNIQUE,
                real_name TEXT,
                phone TEXT,
                category TEXT,
                active INTEGER DEFAULT 1,
                points INTEGER DEFAULT 0,
                participations INTEGER DEFAULT 0,
                photo_path TEXT
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO users (user_id, nickname, real_name, category) VALUES (1, 'old', 'Old Timer', 'Adult')")
            .execute(&pool)
            .await
            .unwrap();

        ensure_schema(&pool).await.unwrap();

        let columns = table_columns(&pool, "users").await.unwrap();
        assert!(columns.contains(&"referrer".to_string()));
        assert!(columns.contains(&"registered_at".to_string()));

        let missing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE registered_at IS NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(missing, 0);
    }
}
