mod ids;
mod question;
mod session;

pub use ids::{ParseIdError, QuestionId, SessionToken, TokenError};
pub use question::{Question, QuestionDraft, QuestionError, ValidatedQuestion};
pub use session::{SessionRecord, SessionRecordError};
