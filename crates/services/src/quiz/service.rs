use std::sync::Arc;

use quiz_core::model::{Question, QuestionId, SessionRecord, SessionRecordError, SessionToken};
use quiz_core::round::{AnswerReason, RoundEngine, RoundError, RoundSettings, SubmittedAnswer};
use rand::rngs::StdRng;
use storage::repository::{QuestionRepository, SessionRepository, Storage};
use tracing::{debug, info, warn};

use super::locks::TokenLocks;
use super::view::{AnswerView, CheckIn, QuestionView, SessionStats, StartView};
use crate::Clock;
use crate::error::QuizError;
use crate::identity::SessionDirectory;

/// Runs trivia rounds against persisted session records.
///
/// Each call takes the token's lock, loads the record, applies one engine
/// step, resolves the questions it needs and saves once. A failed lookup
/// leaves the stored record untouched.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    engine: RoundEngine,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionRepository>,
    directory: SessionDirectory,
    locks: TokenLocks,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: RoundSettings,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        let directory = SessionDirectory::new(
            clock,
            settings.question_count(),
            Arc::clone(&questions),
            Arc::clone(&sessions),
        );
        Self {
            clock,
            engine: RoundEngine::new(settings),
            questions,
            sessions,
            directory,
            locks: TokenLocks::new(),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, settings: RoundSettings, storage: &Storage) -> Self {
        Self::new(
            clock,
            settings,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
        )
    }

    /// Build a service backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Sqlite` if the database cannot be opened or migrated.
    pub async fn sqlite(
        db_url: &str,
        clock: Clock,
        settings: RoundSettings,
    ) -> Result<Self, QuizError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(clock, settings, &storage))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.directory = self.directory.with_clock(clock);
        self
    }

    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.directory = self.directory.with_rng(rng);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &RoundSettings {
        self.engine.settings()
    }

    /// Return the caller's active session or create a new one, then report
    /// its status.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotEnoughQuestions` if a session must be created
    /// but the bank is too small, or `QuizError::Storage` on persistence failures.
    pub async fn check_in(&self, token: Option<&SessionToken>) -> Result<CheckIn, QuizError> {
        let resolved = self.directory.resolve(token).await?;
        let token = resolved.record.token().clone();
        let stats = self.check_status(&token).await?;
        Ok(CheckIn {
            token,
            created: resolved.created,
            stats,
        })
    }

    /// Apply any lapsed timeout and report the score.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::SessionNotFound` for an unknown token and
    /// `QuizError::Storage` on persistence failures.
    pub async fn check_status(&self, token: &SessionToken) -> Result<SessionStats, QuizError> {
        let _guard = self.locks.acquire(token).await;
        let now = self.clock.now();
        let mut record = self.load(token).await?;

        let rec = self.engine.inspect(&mut record, now);
        if rec.timed_out {
            warn!(token = ?token, index = record.current_index(), "question timed out");
        }
        if let Some(summary) = &rec.completed {
            info!(token = ?token, correct = summary.correct, incorrect = summary.incorrect, "round completed");
        }

        self.sessions.save_session(&record).await?;
        debug!(token = ?token, index = record.current_index(), "status checked");
        Ok(SessionStats::from_record(&record))
    }

    /// Start a round, or resume the one in progress, and return the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::SessionNotFound` for an unknown token,
    /// `QuizError::QuestionUnavailable` if the current question cannot be
    /// loaded and `QuizError::Storage` on persistence failures.
    pub async fn start(&self, token: &SessionToken) -> Result<StartView, QuizError> {
        let _guard = self.locks.acquire(token).await;
        let now = self.clock.now();
        let mut record = self.load(token).await?;

        let resumed = record.has_active_game();
        let remaining = self.engine.begin(&mut record, now);
        let question = self.question(current_id(&record)?).await?;

        self.sessions.save_session(&record).await?;
        if resumed {
            debug!(token = ?token, index = record.current_index(), "round resumed");
        } else {
            info!(token = ?token, questions = record.question_count(), "round started");
        }

        Ok(StartView {
            stats: SessionStats::from_record(&record),
            next_question: Some(QuestionView::from_question(&question, remaining)),
        })
    }

    /// Score `answer` for the current question; `-1` skips it.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Round` for a malformed answer or an idle session,
    /// `QuizError::SessionNotFound` for an unknown token,
    /// `QuizError::QuestionUnavailable` if a question cannot be loaded and
    /// `QuizError::Storage` on persistence failures.
    pub async fn submit_answer(
        &self,
        token: &SessionToken,
        answer: i64,
    ) -> Result<AnswerView, QuizError> {
        let answer = SubmittedAnswer::from_raw(answer)?;

        let _guard = self.locks.acquire(token).await;
        let now = self.clock.now();
        let mut record = self.load(token).await?;
        if !record.has_active_game() {
            return Err(RoundError::NotActive.into());
        }

        let question = self.question(current_id(&record)?).await?;
        let outcome = self.engine.answer(&mut record, &question, answer, now)?;
        if outcome.reason == AnswerReason::Timeout {
            warn!(token = ?token, question = %question.id(), "answer arrived after the time limit");
        }
        if let Some(summary) = &outcome.completed {
            info!(token = ?token, correct = summary.correct, incorrect = summary.incorrect, "round completed");
        }

        let next_question = if record.has_active_game() {
            let next = self.question(current_id(&record)?).await?;
            Some(QuestionView::from_question(
                &next,
                self.engine.settings().answer_window(),
            ))
        } else {
            None
        };

        self.sessions.save_session(&record).await?;
        debug!(token = ?token, reason = outcome.reason.as_str(), index = record.current_index(), "answer scored");
        Ok(AnswerView::new(outcome, &record, next_question))
    }

    async fn load(&self, token: &SessionToken) -> Result<SessionRecord, QuizError> {
        self.directory.find(token).await
    }

    async fn question(&self, id: QuestionId) -> Result<Question, QuizError> {
        self.questions
            .get_question(id)
            .await?
            .ok_or(QuizError::QuestionUnavailable(id))
    }
}

fn current_id(record: &SessionRecord) -> Result<QuestionId, QuizError> {
    record.current_question_id().ok_or_else(|| {
        SessionRecordError::IndexOutOfRange {
            index: record.current_index(),
            len: record.question_count(),
        }
        .into()
    })
}
