use async_trait::async_trait;
use quiz_core::model::{Question, QuestionId, SessionRecord, SessionToken, ValidatedQuestion};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read side of the question bank, plus the inserts needed to seed it.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a new question and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_new_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError>;

    /// Persist or replace a question under its own id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch a question by id.
    ///
    /// Returns `Ok(None)` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// All question ids, in ascending order. Used as the sampling population.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_question_ids(&self) -> Result<Vec<QuestionId>, StorageError>;
}

/// One session record per token.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a brand-new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the token is already taken.
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Fetch a record by token regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError>;

    /// Fetch a record by token only while a question is outstanding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_active_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record was never created.
    async fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
    sessions: Arc<Mutex<HashMap<SessionToken, SessionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_new_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let id = QuestionId::new(next);
        guard.insert(id, question.clone().assign_id(id));
        Ok(id)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.keys().copied().collect())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if guard.contains_key(record.token()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(record.token().clone(), record.clone());
        Ok(())
    }

    async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(token).cloned())
    }

    async fn get_active_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard
            .get(token)
            .filter(|record| record.has_active_game())
            .cloned())
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        match guard.get_mut(record.token()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

/// Aggregates the question and session stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo);
        Self {
            questions,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionDraft;
    use quiz_core::time::fixed_now;

    fn draft(text: &str) -> ValidatedQuestion {
        QuestionDraft::new(text, ["yes", "no"], 0).validate().unwrap()
    }

    fn record(token: &str) -> SessionRecord {
        SessionRecord::new(
            SessionToken::new(token).unwrap(),
            vec![QuestionId::new(1), QuestionId::new(2)],
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn inserted_questions_get_sequential_ids() {
        let repo = InMemoryRepository::new();
        let a = repo.insert_new_question(&draft("A?")).await.unwrap();
        let b = repo.insert_new_question(&draft("B?")).await.unwrap();

        assert_eq!(a, QuestionId::new(1));
        assert_eq!(b, QuestionId::new(2));
        assert_eq!(repo.list_question_ids().await.unwrap(), vec![a, b]);
        let fetched = repo.get_question(b).await.unwrap().unwrap();
        assert_eq!(fetched.text(), "B?");
        assert!(repo.get_question(QuestionId::new(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_create_conflicts_on_duplicate_token() {
        let repo = InMemoryRepository::new();
        repo.create_session(&record("t1")).await.unwrap();

        let err = repo.create_session(&record("t1")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn save_requires_existing_session() {
        let repo = InMemoryRepository::new();
        let err = repo.save_session(&record("missing")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn active_lookup_skips_idle_sessions() {
        let repo = InMemoryRepository::new();
        let idle = record("idle");
        repo.create_session(&idle).await.unwrap();

        assert!(repo.get_session(idle.token()).await.unwrap().is_some());
        assert!(repo.get_active_session(idle.token()).await.unwrap().is_none());
    }
}
