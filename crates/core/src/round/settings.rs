use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoundSettingsError {
    #[error("question count must be > 0")]
    InvalidQuestionCount,

    #[error("answer window must be > 0 seconds")]
    InvalidAnswerWindow,

    #[error("grace period cannot be negative")]
    InvalidGrace,
}

/// Tunables for a round.
///
/// The server-side limit is always `answer_window + grace`; it is derived so
/// the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSettings {
    question_count: usize,
    answer_window: Duration,
    grace: Duration,
}

impl RoundSettings {
    pub const DEFAULT_QUESTION_COUNT: usize = 10;
    pub const DEFAULT_ANSWER_WINDOW_SECS: u32 = 30;
    pub const DEFAULT_GRACE_SECS: u32 = 2;

    /// Creates custom round settings.
    ///
    /// # Errors
    ///
    /// Returns `RoundSettingsError` if the count or window is zero, or the grace is negative.
    pub fn new(
        question_count: usize,
        answer_window: Duration,
        grace: Duration,
    ) -> Result<Self, RoundSettingsError> {
        if question_count == 0 {
            return Err(RoundSettingsError::InvalidQuestionCount);
        }
        if answer_window <= Duration::zero() {
            return Err(RoundSettingsError::InvalidAnswerWindow);
        }
        if grace < Duration::zero() {
            return Err(RoundSettingsError::InvalidGrace);
        }
        Ok(Self {
            question_count,
            answer_window,
            grace,
        })
    }

    /// Same as [`RoundSettings::new`] with whole-second durations.
    ///
    /// # Errors
    ///
    /// See [`RoundSettings::new`].
    pub fn from_secs(
        question_count: usize,
        answer_window_secs: u32,
        grace_secs: u32,
    ) -> Result<Self, RoundSettingsError> {
        Self::new(
            question_count,
            Duration::seconds(i64::from(answer_window_secs)),
            Duration::seconds(i64::from(grace_secs)),
        )
    }

    /// Number of questions sampled into a new session (N).
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Time the client is told it has to answer.
    #[must_use]
    pub fn answer_window(&self) -> Duration {
        self.answer_window
    }

    /// Extra allowance for network latency.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    #[must_use]
    pub fn server_limit(&self) -> Duration {
        self.answer_window + self.grace
    }
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            question_count: Self::DEFAULT_QUESTION_COUNT,
            answer_window: Duration::seconds(i64::from(Self::DEFAULT_ANSWER_WINDOW_SECS)),
            grace: Duration::seconds(i64::from(Self::DEFAULT_GRACE_SECS)),
        }
    }
}
