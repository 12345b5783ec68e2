use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least 2 options, got {count}")]
    TooFewOptions { count: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct answer index {index} is out of range for {count} options")]
    CorrectAnswerOutOfRange { index: usize, count: usize },
}

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Unvalidated question input, as supplied by a seed file or an admin tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_answer: usize,
    ) -> Self {
        Self {
            text: text.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_answer,
        }
    }

    /// Validate the draft. Text and options are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or any option is blank, there are
    /// fewer than two options, or the correct index does not name an option.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let count = self.options.len();
        if count < 2 {
            return Err(QuestionError::TooFewOptions { count });
        }

        let mut options = Vec::with_capacity(count);
        for (index, option) in self.options.into_iter().enumerate() {
            let option = option.trim().to_owned();
            if option.is_empty() {
                return Err(QuestionError::EmptyOption { index });
            }
            options.push(option);
        }

        if self.correct_answer >= count {
            return Err(QuestionError::CorrectAnswerOutOfRange {
                index: self.correct_answer,
                count,
            });
        }

        Ok(ValidatedQuestion {
            text,
            options,
            correct_answer: self.correct_answer,
        })
    }
}

/// A question that passed validation but has not been given an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    text: String,
    options: Vec<String>,
    correct_answer: usize,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> usize {
        self.correct_answer
    }
}

/// An immutable trivia question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_answer: usize,
}

impl Question {
    /// Rehydrate a question from storage, re-checking its invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the persisted data is no longer valid.
    pub fn from_persisted(
        id: QuestionId,
        text: String,
        options: Vec<String>,
        correct_answer: usize,
    ) -> Result<Self, QuestionError> {
        Ok(QuestionDraft {
            text,
            options,
            correct_answer,
        }
        .validate()?
        .assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> usize {
        self.correct_answer
    }

    /// Returns true if `choice` is the index of the correct option.
    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_answer
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
