use quiz_core::model::{SessionRecord, SessionToken};

use super::SqliteRepository;
use super::mapping::{conn, encode_json, map_session_row, usize_to_i64};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    token, questions, current_index, has_active_game, question_started_at,
    correct_answers, incorrect_answers, total_time_secs, started_at, ended_at
";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sessions (
                token, questions, current_index, has_active_game, question_started_at,
                correct_answers, incorrect_answers, total_time_secs, started_at, ended_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(record.token().as_str())
        .bind(encode_json(record.questions())?)
        .bind(usize_to_i64("current_index", record.current_index())?)
        .bind(record.has_active_game())
        .bind(record.question_started_at())
        .bind(i64::from(record.correct()))
        .bind(i64::from(record.incorrect()))
        .bind(record.elapsed_total().num_seconds())
        .bind(record.started_at())
        .bind(record.ended_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::Conflict
            } else {
                conn(e)
            }
        })?;

        Ok(())
    }

    async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token = ?1");
        let row = sqlx::query(&sql)
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn get_active_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token = ?1 AND has_active_game = 1"
        );
        let row = sqlx::query(&sql)
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        // `questions` and `token` are fixed at creation and never rewritten.
        let res = sqlx::query(
            r"
            UPDATE sessions SET
                current_index = ?2,
                has_active_game = ?3,
                question_started_at = ?4,
                correct_answers = ?5,
                incorrect_answers = ?6,
                total_time_secs = ?7,
                started_at = ?8,
                ended_at = ?9
            WHERE token = ?1
            ",
        )
        .bind(record.token().as_str())
        .bind(usize_to_i64("current_index", record.current_index())?)
        .bind(record.has_active_game())
        .bind(record.question_started_at())
        .bind(i64::from(record.correct()))
        .bind(i64::from(record.incorrect()))
        .bind(record.elapsed_total().num_seconds())
        .bind(record.started_at())
        .bind(record.ended_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
