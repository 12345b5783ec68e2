//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, SessionRecordError};
use quiz_core::round::RoundError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `QuizService` and `SessionDirectory`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no session for this token")]
    SessionNotFound,
    #[error("question {0} is unavailable")]
    QuestionUnavailable(QuestionId),
    #[error("need {required} questions for a round but only {available} exist")]
    NotEnoughQuestions { required: usize, available: usize },
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Record(#[from] SessionRecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
