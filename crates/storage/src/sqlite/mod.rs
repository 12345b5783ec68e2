use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use sqlx::{Executor, SqlitePool};
use thiserror::Error;

use crate::repository::{QuestionRepository, SessionRepository, Storage};

mod mapping;
mod migrate;
mod question_repo;
mod session_repo;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Applied to every pooled connection.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;";

/// Question bank and session store on a single `SQLite` pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

async fn prepare_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    conn.execute(CONNECTION_PRAGMAS).await?;
    Ok(())
}

fn pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .after_connect(|conn, _meta| Box::pin(prepare_connection(conn)))
}

impl SqliteRepository {
    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if no connection can be opened or if switching
    /// a connection to WAL journaling or setting its busy timeout fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = pool_options().connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Apply any schema versions not yet recorded. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and expose both repositories over the same pool.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo);
        Ok(Self {
            questions,
            sessions,
        })
    }
}
