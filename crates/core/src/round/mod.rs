//! Round state machine: settings, lazy timeout reconciliation and the
//! start/answer/inspect steps applied to a `SessionRecord`.
//!
//! Everything here is pure. Callers pass the current time in and persist the
//! mutated record themselves.

mod engine;
mod reconcile;
mod settings;

pub use engine::{AnswerOutcome, AnswerReason, RoundEngine, RoundError, SubmittedAnswer};
pub use reconcile::{reconcile, settle, Reconciliation, RoundSummary};
pub use settings::{RoundSettings, RoundSettingsError};
