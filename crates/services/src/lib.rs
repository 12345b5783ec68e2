#![forbid(unsafe_code)]

pub mod error;
pub mod identity;
pub mod quiz;

pub use quiz_core::Clock;

pub use error::QuizError;
pub use identity::{ResolvedSession, SessionDirectory};
pub use quiz::{AnswerView, CheckIn, QuestionView, QuizService, SessionStats, StartView, TokenLocks};
