use chrono::Duration;
use quiz_core::model::{Question, QuestionId, SessionRecord, SessionToken};
use quiz_core::round::{AnswerOutcome, AnswerReason, RoundSummary};
use serde::Serialize;

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Score totals and position of a session, as reported after every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub current_index: usize,
    pub has_active_game: bool,
    pub total_correct: u32,
    pub total_incorrect: u32,
}

impl SessionStats {
    #[must_use]
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            current_index: record.current_index(),
            has_active_game: record.has_active_game(),
            total_correct: record.correct(),
            total_incorrect: record.incorrect(),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A question as shown to the participant. The correct index is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    /// Seconds left to answer.
    pub time_limit: i64,
}

impl QuestionView {
    #[must_use]
    pub fn from_question(question: &Question, remaining: Duration) -> Self {
        Self {
            id: question.id(),
            text: question.text().to_owned(),
            options: question.options().to_vec(),
            time_limit: remaining.num_seconds().max(0),
        }
    }
}

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartView {
    #[serde(flatten)]
    pub stats: SessionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    pub correct: bool,
    pub correct_answer_idx: usize,
    #[serde(skip_serializing_if = "reason_is_blank")]
    pub reason: AnswerReason,
    #[serde(flatten)]
    pub stats: SessionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<QuestionView>,
    /// Final score, present only on the answer that finished the round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_round: Option<RoundSummary>,
}

fn reason_is_blank(reason: &AnswerReason) -> bool {
    reason.as_str().is_empty()
}

impl AnswerView {
    #[must_use]
    pub fn new(
        outcome: AnswerOutcome,
        record: &SessionRecord,
        next_question: Option<QuestionView>,
    ) -> Self {
        Self {
            correct: outcome.correct,
            correct_answer_idx: outcome.correct_answer_index,
            reason: outcome.reason,
            stats: SessionStats::from_record(record),
            next_question,
            completed_round: outcome.completed,
        }
    }
}

/// Result of presenting a token on first contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckIn {
    pub token: SessionToken,
    /// `true` when a new session was created for this call.
    pub created: bool,
    #[serde(flatten)]
    pub stats: SessionStats,
}
