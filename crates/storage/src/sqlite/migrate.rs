use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned migrations for the question bank and session tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: questions and sessions.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        // `options` is a JSON array of strings.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    text TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_answer INTEGER NOT NULL CHECK (correct_answer >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // `questions` is a JSON array of question ids, fixed at creation.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    questions TEXT NOT NULL,
                    current_index INTEGER NOT NULL CHECK (current_index >= 0),
                    has_active_game INTEGER NOT NULL CHECK (has_active_game IN (0, 1)),
                    question_started_at TEXT,
                    correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
                    incorrect_answers INTEGER NOT NULL CHECK (incorrect_answers >= 0),
                    total_time_secs INTEGER NOT NULL CHECK (total_time_secs >= 0),
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    CHECK ((has_active_game = 1) = (question_started_at IS NOT NULL))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_token_active
                    ON sessions (token, has_active_game);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
