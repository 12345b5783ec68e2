use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{QuestionId, SessionToken};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("a session needs at least one question")]
    NoQuestions,

    #[error("current index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("accumulated round time cannot be negative")]
    NegativeElapsed,

    #[error("ended_at is before started_at")]
    InvalidTimeRange,
}

/// Per-participant round state, keyed by an opaque token.
///
/// The question sequence is fixed at creation; only `current_index` walks
/// through it. A question is outstanding exactly when `question_started_at`
/// is set, so the active flag is derived rather than stored.
///
/// Between operations `current_index` is always below the number of
/// questions: reaching the end completes the round and rewinds to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    token: SessionToken,
    questions: Vec<QuestionId>,
    current_index: usize,
    question_started_at: Option<DateTime<Utc>>,
    correct: u32,
    incorrect: u32,
    elapsed_total: Duration,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Create a fresh, inactive record.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::NoQuestions` for an empty question sequence.
    pub fn new(
        token: SessionToken,
        questions: Vec<QuestionId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionRecordError> {
        if questions.is_empty() {
            return Err(SessionRecordError::NoQuestions);
        }
        Ok(Self {
            token,
            questions,
            current_index: 0,
            question_started_at: None,
            correct: 0,
            incorrect: 0,
            elapsed_total: Duration::zero(),
            started_at: created_at,
            ended_at: None,
        })
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError` if the persisted fields break a record invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        token: SessionToken,
        questions: Vec<QuestionId>,
        current_index: usize,
        question_started_at: Option<DateTime<Utc>>,
        correct: u32,
        incorrect: u32,
        elapsed_total: Duration,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionRecordError> {
        if questions.is_empty() {
            return Err(SessionRecordError::NoQuestions);
        }
        if current_index >= questions.len() {
            return Err(SessionRecordError::IndexOutOfRange {
                index: current_index,
                len: questions.len(),
            });
        }
        if elapsed_total < Duration::zero() {
            return Err(SessionRecordError::NegativeElapsed);
        }
        if ended_at.is_some_and(|end| end < started_at) {
            return Err(SessionRecordError::InvalidTimeRange);
        }

        Ok(Self {
            token,
            questions,
            current_index,
            question_started_at,
            correct,
            incorrect,
            elapsed_total,
            started_at,
            ended_at,
        })
    }

    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionId] {
        &self.questions
    }

    /// Number of questions in a round (N).
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The question at `current_index`, if the index has not run off the end.
    #[must_use]
    pub fn current_question_id(&self) -> Option<QuestionId> {
        self.questions.get(self.current_index).copied()
    }

    #[must_use]
    pub fn has_active_game(&self) -> bool {
        self.question_started_at.is_some()
    }

    #[must_use]
    pub fn question_started_at(&self) -> Option<DateTime<Utc>> {
        self.question_started_at
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    /// Time spent on questions of the current round, in whole seconds.
    #[must_use]
    pub fn elapsed_total(&self) -> Duration {
        self.elapsed_total
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    pub(crate) fn record_correct(&mut self) {
        self.correct = self.correct.saturating_add(1);
    }

    pub(crate) fn record_incorrect(&mut self) {
        self.incorrect = self.incorrect.saturating_add(1);
    }

    pub(crate) fn add_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_total += elapsed;
    }

    pub(crate) fn advance(&mut self) {
        self.current_index += 1;
    }

    pub(crate) fn arm(&mut self, now: DateTime<Utc>) {
        self.question_started_at = Some(now);
    }

    pub(crate) fn begin_round(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
        self.ended_at = None;
        self.arm(now);
    }

    pub(crate) fn reset_round(&mut self, now: DateTime<Utc>) {
        self.question_started_at = None;
        self.current_index = 0;
        self.correct = 0;
        self.incorrect = 0;
        self.elapsed_total = Duration::zero();
        self.ended_at = Some(now);
    }
}
