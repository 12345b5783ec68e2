use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::SessionRecord;
use crate::round::RoundSettings;
use crate::time::elapsed_whole_seconds;

/// Final score of a round, captured just before Settle rewinds the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub correct: u32,
    pub incorrect: u32,
    pub questions: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "total_time")]
    pub elapsed_secs: i64,
}

/// Result of comparing the armed question's start time with "now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The outstanding question ran past the server limit and was force-advanced.
    pub timed_out: bool,
    /// Client-facing time left on the question now at `current_index`.
    pub remaining: Duration,
    /// Set when the forced advance finished the round.
    pub completed: Option<RoundSummary>,
}

impl Reconciliation {
    fn live(remaining: Duration) -> Self {
        Self {
            timed_out: false,
            remaining,
            completed: None,
        }
    }
}

/// Apply any timeout that has lapsed since the current question was armed.
///
/// A question is live while `elapsed <= answer_window + grace`. Past that it
/// is scored as incorrect, the index advances and the record is settled,
/// which re-arms the timer at `now` (or completes the round). At most one
/// question is skipped per call.
pub fn reconcile(
    record: &mut SessionRecord,
    settings: &RoundSettings,
    now: DateTime<Utc>,
) -> Reconciliation {
    let Some(started) = record.question_started_at() else {
        return Reconciliation::live(settings.answer_window());
    };

    let elapsed = elapsed_whole_seconds(started, now);
    if elapsed <= settings.server_limit() {
        // Inside the grace window the client budget is already spent.
        let remaining = (settings.answer_window() - elapsed).max(Duration::zero());
        return Reconciliation::live(remaining);
    }

    record.record_incorrect();
    record.add_elapsed(elapsed);
    record.advance();
    let completed = settle(record, now);

    Reconciliation {
        timed_out: true,
        remaining: Duration::zero(),
        completed,
    }
}

/// Arm the timer for the question at `current_index`, or finish the round
/// when the index has run past the last question.
///
/// Finishing clears the timer, rewinds to the first question, zeroes the
/// counters and stamps `ended_at`, leaving the record ready for a new round
/// over the same question sequence.
pub fn settle(record: &mut SessionRecord, now: DateTime<Utc>) -> Option<RoundSummary> {
    if !record.is_exhausted() {
        record.arm(now);
        return None;
    }

    let summary = RoundSummary {
        correct: record.correct(),
        incorrect: record.incorrect(),
        questions: record.question_count(),
        started_at: record.started_at(),
        completed_at: now,
        elapsed_secs: record.elapsed_total().num_seconds(),
    };
    record.reset_round(now);
    Some(summary)
}
