use quiz_core::model::{QuestionDraft, QuestionError, QuestionId};
use thiserror::Error;

use crate::repository::{QuestionRepository, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error("sample question {id} is invalid: {source}")]
    InvalidSample {
        id: QuestionId,
        #[source]
        source: QuestionError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The bundled general-knowledge bank.
#[must_use]
pub fn sample_questions() -> Vec<QuestionDraft> {
    vec![
        QuestionDraft::new(
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Mercury"],
            1,
        ),
        QuestionDraft::new(
            "What is the chemical symbol for gold?",
            ["Ag", "Gd", "Au", "Go"],
            2,
        ),
        QuestionDraft::new(
            "How many continents are there on Earth?",
            ["5", "6", "7", "8"],
            2,
        ),
        QuestionDraft::new(
            "Who wrote \"Pride and Prejudice\"?",
            ["Jane Austen", "Charlotte Bronte", "Mary Shelley", "George Eliot"],
            0,
        ),
        QuestionDraft::new(
            "What is the largest ocean on Earth?",
            ["Atlantic", "Indian", "Arctic", "Pacific"],
            3,
        ),
        QuestionDraft::new(
            "Which gas do plants absorb from the air for photosynthesis?",
            ["Oxygen", "Carbon dioxide", "Nitrogen", "Hydrogen"],
            1,
        ),
        QuestionDraft::new(
            "In which year did the first person walk on the Moon?",
            ["1965", "1969", "1972", "1959"],
            1,
        ),
        QuestionDraft::new(
            "What is the smallest prime number?",
            ["0", "1", "2", "3"],
            2,
        ),
        QuestionDraft::new(
            "Which language has the most native speakers?",
            ["English", "Spanish", "Hindi", "Mandarin Chinese"],
            3,
        ),
        QuestionDraft::new(
            "What is the capital of Canada?",
            ["Toronto", "Ottawa", "Vancouver", "Montreal"],
            1,
        ),
        QuestionDraft::new(
            "How many sides does a hexagon have?",
            ["5", "6", "7", "8"],
            1,
        ),
        QuestionDraft::new(
            "Which element has atomic number 1?",
            ["Helium", "Oxygen", "Hydrogen", "Lithium"],
            2,
        ),
    ]
}

/// Write the bundled bank under ids `1..=N`, replacing whatever those ids held.
///
/// Running it twice leaves the same rows behind.
///
/// # Errors
///
/// Returns `SeedError` if a sample fails validation or the write fails.
pub async fn write_samples(questions: &dyn QuestionRepository) -> Result<usize, SeedError> {
    let mut written = 0_usize;
    for (id, draft) in (1_u64..).map(QuestionId::new).zip(sample_questions()) {
        let question = draft
            .validate()
            .map_err(|source| SeedError::InvalidSample { id, source })?;
        questions.upsert_question(&question.assign_id(id)).await?;
        written += 1;
    }
    Ok(written)
}
