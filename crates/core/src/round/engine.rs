use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::model::{Question, QuestionId, SessionRecord};
use crate::round::reconcile::{reconcile, settle, Reconciliation, RoundSummary};
use crate::round::RoundSettings;
use crate::time::elapsed_whole_seconds;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoundError {
    #[error("no active game for this session")]
    NotActive,

    #[error("invalid answer value: {0}")]
    InvalidAnswer(i64),

    #[error("answered question {got} but the current question is {expected}")]
    QuestionMismatch {
        expected: QuestionId,
        got: QuestionId,
    },
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// A submitted answer after decoding the wire sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmittedAnswer {
    /// Explicit "no answer"; advances without touching either counter.
    Skip,
    /// Index of the chosen option. Indexes past the last option are wrong answers.
    Choice(usize),
}

impl SubmittedAnswer {
    /// Wire value meaning "no answer given".
    pub const SKIP_SENTINEL: i64 = -1;

    /// Decode a raw answer where `-1` means skip.
    ///
    /// # Errors
    ///
    /// Returns `RoundError::InvalidAnswer` for negative values other than the sentinel.
    pub fn from_raw(raw: i64) -> Result<Self, RoundError> {
        if raw == Self::SKIP_SENTINEL {
            return Ok(Self::Skip);
        }
        usize::try_from(raw)
            .map(Self::Choice)
            .map_err(|_| RoundError::InvalidAnswer(raw))
    }
}

/// Why an answer was scored the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerReason {
    Correct,
    WrongAnswer,
    Timeout,
    Skipped,
}

impl AnswerReason {
    /// Wire representation; a skip is reported as an empty reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerReason::Correct => "correct",
            AnswerReason::WrongAnswer => "wrong_answer",
            AnswerReason::Timeout => "timeout",
            AnswerReason::Skipped => "",
        }
    }
}

impl Serialize for AnswerReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Scoring result for one submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// Revealed for the question just answered, whatever the outcome.
    pub correct_answer_index: usize,
    pub reason: AnswerReason,
    /// Set when this answer (or the timeout it lost to) finished the round.
    pub completed: Option<RoundSummary>,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Pure round state machine.
///
/// Every step reconciles lapsed timeouts first and routes every index advance
/// through [`settle`], so a record leaves each call with the timer armed for
/// a live question or with the round completed and rewound.
#[derive(Debug, Clone, Default)]
pub struct RoundEngine {
    settings: RoundSettings,
}

impl RoundEngine {
    #[must_use]
    pub fn new(settings: RoundSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &RoundSettings {
        &self.settings
    }

    /// Status check: only applies lapsed timeouts.
    pub fn inspect(&self, record: &mut SessionRecord, now: DateTime<Utc>) -> Reconciliation {
        reconcile(record, &self.settings, now)
    }

    /// Start a round, or resume the one in progress.
    ///
    /// Returns the time left on the question now at `current_index`. A
    /// lapsed question is skipped by the reconcile and the next one is armed
    /// at `now` with the full window; if the lapsed question was the last
    /// one, a fresh round is started in its place.
    pub fn begin(&self, record: &mut SessionRecord, now: DateTime<Utc>) -> Duration {
        if !record.has_active_game() {
            record.begin_round(now);
        }

        let rec = reconcile(record, &self.settings, now);
        if !record.has_active_game() {
            record.begin_round(now);
            return self.settings.answer_window();
        }
        if rec.timed_out {
            return self.settings.answer_window();
        }
        rec.remaining
    }

    /// Score an answer for the current question and advance.
    ///
    /// `question` must be the question at `current_index` as it was before
    /// this call. An answer that arrives after the server limit is ignored and
    /// reported as a timeout.
    ///
    /// # Errors
    ///
    /// Returns `RoundError::NotActive` if no question is outstanding and
    /// `RoundError::QuestionMismatch` if `question` is not the current one.
    /// Nothing is mutated on error.
    pub fn answer(
        &self,
        record: &mut SessionRecord,
        question: &Question,
        answer: SubmittedAnswer,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, RoundError> {
        let Some(started) = record.question_started_at() else {
            return Err(RoundError::NotActive);
        };
        let expected = record.current_question_id().ok_or(RoundError::NotActive)?;
        if question.id() != expected {
            return Err(RoundError::QuestionMismatch {
                expected,
                got: question.id(),
            });
        }

        let correct_answer_index = question.correct_answer();

        // The reconcile already advanced and settled; settling again would
        // re-arm the next question a second time.
        let rec = reconcile(record, &self.settings, now);
        if rec.timed_out {
            return Ok(AnswerOutcome {
                correct: false,
                correct_answer_index,
                reason: AnswerReason::Timeout,
                completed: rec.completed,
            });
        }

        let (correct, reason) = match answer {
            SubmittedAnswer::Skip => (false, AnswerReason::Skipped),
            SubmittedAnswer::Choice(choice) if question.is_correct(choice) => {
                record.record_correct();
                (true, AnswerReason::Correct)
            }
            SubmittedAnswer::Choice(_) => {
                record.record_incorrect();
                (false, AnswerReason::WrongAnswer)
            }
        };

        record.add_elapsed(elapsed_whole_seconds(started, now));
        record.advance();
        let completed = settle(record, now);

        Ok(AnswerOutcome {
            correct,
            correct_answer_index,
            reason,
            completed,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, SessionToken};
    use crate::time::fixed_now;

    fn question(id: u64, correct: usize) -> Question {
        QuestionDraft::new(format!("Q{id}"), ["a", "b", "c", "d"], correct)
            .validate()
            .unwrap()
            .assign_id(QuestionId::new(id))
    }

    fn questions(n: u64) -> Vec<Question> {
        (1..=n).map(|id| question(id, 2)).collect()
    }

    fn fresh_record(n: u64) -> SessionRecord {
        SessionRecord::new(
            SessionToken::new("tok").unwrap(),
            (1..=n).map(QuestionId::new).collect(),
            fixed_now(),
        )
        .unwrap()
    }

    fn engine(n: usize) -> RoundEngine {
        RoundEngine::new(RoundSettings::from_secs(n, 30, 2).unwrap())
    }

    fn current<'a>(record: &SessionRecord, qs: &'a [Question]) -> &'a Question {
        &qs[record.current_index()]
    }

    fn assert_at_rest(record: &SessionRecord) {
        assert!(record.current_index() < record.question_count());
        assert_eq!(
            record.has_active_game(),
            record.question_started_at().is_some()
        );
        if !record.has_active_game() {
            assert_eq!(record.current_index(), 0);
            assert_eq!(record.correct(), 0);
            assert_eq!(record.incorrect(), 0);
        }
    }

    #[test]
    fn raw_answers_decode() {
        assert_eq!(SubmittedAnswer::from_raw(-1), Ok(SubmittedAnswer::Skip));
        assert_eq!(SubmittedAnswer::from_raw(3), Ok(SubmittedAnswer::Choice(3)));
        assert_eq!(
            SubmittedAnswer::from_raw(-2),
            Err(RoundError::InvalidAnswer(-2))
        );
    }

    #[test]
    fn begin_arms_fresh_round() {
        let t0 = fixed_now();
        let engine = engine(3);
        let mut record = fresh_record(3);

        let remaining = engine.begin(&mut record, t0);

        assert_eq!(remaining, Duration::seconds(30));
        assert!(record.has_active_game());
        assert_eq!(record.current_index(), 0);
        assert_eq!(record.question_started_at(), Some(t0));
        assert_eq!(record.started_at(), t0);
    }

    #[test]
    fn begin_resumes_without_rearming() {
        let t0 = fixed_now();
        let engine = engine(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let remaining = engine.begin(&mut record, t0 + Duration::seconds(10));

        assert_eq!(remaining, Duration::seconds(20));
        assert_eq!(record.question_started_at(), Some(t0));
    }

    #[test]
    fn begin_after_stale_middle_question_reports_full_window() {
        let t0 = fixed_now();
        let engine = engine(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let later = t0 + Duration::seconds(40);
        let remaining = engine.begin(&mut record, later);

        assert_eq!(remaining, Duration::seconds(30));
        assert!(record.has_active_game());
        assert_eq!(record.current_index(), 1);
        assert_eq!(record.incorrect(), 1);
        assert_eq!(record.question_started_at(), Some(later));
    }

    #[test]
    fn begin_after_stale_last_question_starts_new_round() {
        let t0 = fixed_now();
        let engine = engine(2);
        let qs = questions(2);
        let mut record = fresh_record(2);
        engine.begin(&mut record, t0);
        engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(2), t0)
            .unwrap();

        let later = t0 + Duration::minutes(5);
        let remaining = engine.begin(&mut record, later);

        assert_eq!(remaining, Duration::seconds(30));
        assert!(record.has_active_game());
        assert_eq!(record.current_index(), 0);
        assert_eq!(record.correct(), 0);
        assert_eq!(record.question_started_at(), Some(later));
        assert_eq!(record.ended_at(), None);
    }

    // Scenario A
    #[test]
    fn correct_answer_within_budget_advances() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let now = t0 + Duration::seconds(5);
        let outcome = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(2), now)
            .unwrap();

        assert!(outcome.correct);
        assert_eq!(outcome.reason, AnswerReason::Correct);
        assert_eq!(outcome.correct_answer_index, 2);
        assert_eq!(record.current_index(), 1);
        assert_eq!(record.correct(), 1);
        assert_eq!(record.current_question_id(), Some(QuestionId::new(2)));
        assert_eq!(record.question_started_at(), Some(now));
        assert_eq!(record.elapsed_total(), Duration::seconds(5));
    }

    #[test]
    fn wrong_answer_counts_incorrect() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let outcome = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(0), t0)
            .unwrap();

        assert!(!outcome.correct);
        assert_eq!(outcome.reason, AnswerReason::WrongAnswer);
        assert_eq!(record.incorrect(), 1);
        assert_eq!(record.current_index(), 1);
    }

    #[test]
    fn out_of_range_choice_is_wrong() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let outcome = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(42), t0)
            .unwrap();

        assert_eq!(outcome.reason, AnswerReason::WrongAnswer);
        assert_eq!(record.incorrect(), 1);
    }

    // Scenario B
    #[test]
    fn answering_last_question_completes_and_rewinds() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);
        for _ in 0..2 {
            let q = current(&record, &qs);
            engine
                .answer(&mut record, q, SubmittedAnswer::Choice(2), t0)
                .unwrap();
        }
        assert_eq!(record.current_index(), 2);

        let end = t0 + Duration::seconds(1);
        let outcome = engine
            .answer(&mut record, &qs[2], SubmittedAnswer::Choice(1), end)
            .unwrap();

        let summary = outcome.completed.expect("round completed");
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.incorrect, 1);
        assert_eq!(summary.completed_at, end);
        assert_eq!(record.current_index(), 0);
        assert!(!record.has_active_game());
        assert_eq!(record.correct(), 0);
        assert_eq!(record.incorrect(), 0);
        assert_eq!(record.ended_at(), Some(end));
        assert_eq!(
            record.questions(),
            [QuestionId::new(1), QuestionId::new(2), QuestionId::new(3)]
        );
    }

    // Timeout exclusivity
    #[test]
    fn late_correct_answer_is_a_timeout() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let now = t0 + Duration::seconds(45);
        let outcome = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(2), now)
            .unwrap();

        assert!(!outcome.correct);
        assert_eq!(outcome.reason, AnswerReason::Timeout);
        assert_eq!(outcome.correct_answer_index, 2);
        assert_eq!(record.correct(), 0);
        assert_eq!(record.incorrect(), 1);
        assert_eq!(record.current_index(), 1);
        assert_eq!(record.question_started_at(), Some(now));
    }

    #[test]
    fn late_answer_on_last_question_completes_once() {
        let t0 = fixed_now();
        let engine = engine(1);
        let qs = questions(1);
        let mut record = fresh_record(1);
        engine.begin(&mut record, t0);

        let now = t0 + Duration::seconds(33);
        let outcome = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(2), now)
            .unwrap();

        assert_eq!(outcome.reason, AnswerReason::Timeout);
        assert_eq!(outcome.completed.map(|s| s.incorrect), Some(1));
        assert!(!record.has_active_game());
        assert_eq!(record.current_index(), 0);
    }

    // Skip sentinel / Scenario D
    #[test]
    fn skip_advances_without_scoring() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let outcome = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Skip, t0)
            .unwrap();

        assert!(!outcome.correct);
        assert_eq!(outcome.reason, AnswerReason::Skipped);
        assert_eq!(outcome.reason.as_str(), "");
        assert_eq!(outcome.correct_answer_index, 2);
        assert_eq!(record.correct(), 0);
        assert_eq!(record.incorrect(), 0);
        assert_eq!(record.current_index(), 1);
    }

    #[test]
    fn answer_requires_active_game() {
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        let before = record.clone();

        let err = engine
            .answer(&mut record, &qs[0], SubmittedAnswer::Choice(2), fixed_now())
            .unwrap_err();

        assert_eq!(err, RoundError::NotActive);
        assert_eq!(record, before);
    }

    #[test]
    fn answer_rejects_stale_question() {
        let t0 = fixed_now();
        let engine = engine(3);
        let qs = questions(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);
        let before = record.clone();

        let err = engine
            .answer(&mut record, &qs[1], SubmittedAnswer::Choice(2), t0)
            .unwrap_err();

        assert!(matches!(err, RoundError::QuestionMismatch { .. }));
        assert_eq!(record, before);
    }

    // Scenario C
    #[test]
    fn inspect_force_advances_expired_question() {
        let t0 = fixed_now();
        let engine = engine(3);
        let mut record = fresh_record(3);
        engine.begin(&mut record, t0);

        let now = t0 + Duration::seconds(33);
        let rec = engine.inspect(&mut record, now);

        assert!(rec.timed_out);
        assert_eq!(record.current_index(), 1);
        assert_eq!(record.incorrect(), 1);
        assert_eq!(record.question_started_at(), Some(now));
    }

    #[test]
    fn counters_are_monotonic_and_state_settles_every_step() {
        let engine = engine(4);
        let qs = questions(4);
        let mut record = fresh_record(4);
        let mut now = fixed_now();
        // (seconds until the step, raw answer); None means a status check.
        let steps: [(i64, Option<i64>); 12] = [
            (0, Some(2)),
            (40, Some(2)),
            (3, Some(-1)),
            (5, Some(0)),
            (10, None),
            (35, None),
            (1, Some(2)),
            (2, Some(2)),
            (50, Some(1)),
            (0, None),
            (4, Some(-1)),
            (33, None),
        ];

        engine.begin(&mut record, now);
        let mut last = (0_u32, 0_u32);
        for (delay, raw) in steps {
            now += Duration::seconds(delay);
            if !record.has_active_game() {
                engine.begin(&mut record, now);
                last = (0, 0);
            }

            let completed = match raw {
                Some(raw) => {
                    let q = current(&record, &qs).clone();
                    let answer = SubmittedAnswer::from_raw(raw).unwrap();
                    engine.answer(&mut record, &q, answer, now).unwrap().completed
                }
                None => engine.inspect(&mut record, now).completed,
            };

            assert_at_rest(&record);
            if completed.is_none() {
                assert!(record.correct() >= last.0);
                assert!(record.incorrect() >= last.1);
                last = (record.correct(), record.incorrect());
            } else {
                last = (0, 0);
            }
        }
    }
}
