use quiz_core::model::{Question, QuestionId, ValidatedQuestion};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, encode_json, map_question_row, question_id_from_i64, question_id_to_i64, ser,
    usize_to_i64,
};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_new_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO questions (text, options, correct_answer)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(question.text())
        .bind(encode_json(question.options())?)
        .bind(usize_to_i64("correct_answer", question.correct_answer())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        question_id_from_i64(res.last_insert_rowid())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (id, text, options, correct_answer)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                options = excluded.options,
                correct_answer = excluded.correct_answer
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(question.text())
        .bind(encode_json(question.options())?)
        .bind(usize_to_i64("correct_answer", question.correct_answer())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, text, options, correct_answer
            FROM questions
            WHERE id = ?1
            ",
        )
        .bind(question_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn list_question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM questions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?);
        }
        Ok(ids)
    }
}
