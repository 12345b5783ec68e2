use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{Question, QuestionId, SessionRecord, SessionToken};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    u64::try_from(v)
        .map(QuestionId::new)
        .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let text: String = row.try_get("text").map_err(ser)?;
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let correct_answer = usize_from_i64(
        "correct_answer",
        row.try_get::<i64, _>("correct_answer").map_err(ser)?,
    )?;

    Question::from_persisted(id, text, options, correct_answer).map_err(ser)
}

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SessionRecord, StorageError> {
    let token =
        SessionToken::new(row.try_get::<String, _>("token").map_err(ser)?).map_err(ser)?;
    let questions_json: String = row.try_get("questions").map_err(ser)?;
    let questions: Vec<QuestionId> = serde_json::from_str(&questions_json).map_err(ser)?;
    let current_index = usize_from_i64(
        "current_index",
        row.try_get::<i64, _>("current_index").map_err(ser)?,
    )?;
    let has_active_game: bool = row.try_get("has_active_game").map_err(ser)?;
    let question_started_at: Option<DateTime<Utc>> =
        row.try_get("question_started_at").map_err(ser)?;
    if has_active_game != question_started_at.is_some() {
        return Err(StorageError::Serialization(
            "has_active_game disagrees with question_started_at".into(),
        ));
    }
    let correct = u32_from_i64(
        "correct_answers",
        row.try_get::<i64, _>("correct_answers").map_err(ser)?,
    )?;
    let incorrect = u32_from_i64(
        "incorrect_answers",
        row.try_get::<i64, _>("incorrect_answers").map_err(ser)?,
    )?;
    let elapsed_total = Duration::seconds(row.try_get::<i64, _>("total_time_secs").map_err(ser)?);

    SessionRecord::from_persisted(
        token,
        questions,
        current_index,
        question_started_at,
        correct,
        incorrect,
        elapsed_total,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("ended_at").map_err(ser)?,
    )
    .map_err(ser)
}
