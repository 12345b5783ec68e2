mod locks;
mod service;
mod view;

pub use locks::TokenLocks;
pub use service::QuizService;
pub use view::{AnswerView, CheckIn, QuestionView, SessionStats, StartView};
