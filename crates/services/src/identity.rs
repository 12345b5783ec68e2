use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{QuestionId, SessionRecord, SessionToken};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use storage::repository::{QuestionRepository, SessionRepository};
use tracing::info;

use crate::Clock;
use crate::error::QuizError;

/// A fresh opaque token drawn from `rng`.
pub fn generate_token(rng: &mut impl RngCore) -> SessionToken {
    let mut bytes = [0_u8; SessionToken::BYTES];
    rng.fill_bytes(&mut bytes);
    SessionToken::from_bytes(&bytes)
}

/// Pick `count` distinct ids in random order.
///
/// # Errors
///
/// Returns `QuizError::NotEnoughQuestions` when the bank holds fewer than
/// `count` questions.
pub fn sample_question_ids(
    ids: &[QuestionId],
    count: usize,
    rng: &mut impl RngCore,
) -> Result<Vec<QuestionId>, QuizError> {
    if ids.len() < count || count == 0 {
        return Err(QuizError::NotEnoughQuestions {
            required: count,
            available: ids.len(),
        });
    }

    let mut picked = ids.to_vec();
    picked.shuffle(rng);
    picked.truncate(count);
    Ok(picked)
}

/// A session handed back by [`SessionDirectory::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub record: SessionRecord,
    /// `true` when no active session matched and a new one was created.
    pub created: bool,
}

/// Maps caller tokens to session records, creating sessions on first contact.
#[derive(Clone)]
pub struct SessionDirectory {
    clock: Clock,
    question_count: usize,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionRepository>,
    rng: Arc<Mutex<StdRng>>,
}

impl SessionDirectory {
    #[must_use]
    pub fn new(
        clock: Clock,
        question_count: usize,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            question_count,
            questions,
            sessions,
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the random source, e.g. with a seeded one in tests.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    /// Return the active session for `token`, or create a new one.
    ///
    /// A token whose session is idle (or unknown) gets a brand-new session
    /// under a fresh token with a fresh question sample.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotEnoughQuestions` if the bank is too small and
    /// `QuizError::Storage` on persistence failures.
    pub async fn resolve(&self, token: Option<&SessionToken>) -> Result<ResolvedSession, QuizError> {
        if let Some(token) = token {
            if let Some(record) = self.sessions.get_active_session(token).await? {
                return Ok(ResolvedSession {
                    record,
                    created: false,
                });
            }
        }

        let ids = self.questions.list_question_ids().await?;
        let (token, picked) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let picked = sample_question_ids(&ids, self.question_count, &mut *rng)?;
            (generate_token(&mut *rng), picked)
        };

        let record = SessionRecord::new(token, picked, self.clock.now())?;
        self.sessions.create_session(&record).await?;
        info!(token = ?record.token(), questions = record.question_count(), "session created");

        Ok(ResolvedSession {
            record,
            created: true,
        })
    }

    /// Load the session for `token` in whatever state it is in.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::SessionNotFound` if the token is unknown.
    pub async fn find(&self, token: &SessionToken) -> Result<SessionRecord, QuizError> {
        self.sessions
            .get_session(token)
            .await?
            .ok_or(QuizError::SessionNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionDraft;
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    async fn repo_with_questions(n: usize) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for i in 0..n {
            let q = QuestionDraft::new(format!("Q{i}"), ["a", "b"], 0)
                .validate()
                .unwrap();
            repo.insert_new_question(&q).await.unwrap();
        }
        repo
    }

    fn directory(repo: &InMemoryRepository, count: usize) -> SessionDirectory {
        SessionDirectory::new(
            fixed_clock(),
            count,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .with_rng(seeded())
    }

    #[test]
    fn generated_tokens_are_64_hex_chars() {
        let mut rng = seeded();
        let a = generate_token(&mut rng);
        let b = generate_token(&mut rng);

        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn sampling_picks_distinct_ids() {
        let ids: Vec<_> = (1..=20).map(QuestionId::new).collect();
        let picked = sample_question_ids(&ids, 10, &mut seeded()).unwrap();

        assert_eq!(picked.len(), 10);
        let mut unique = picked.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 10);
        assert!(picked.iter().all(|id| ids.contains(id)));
    }

    #[test]
    fn sampling_fails_fast_on_small_bank() {
        let ids: Vec<_> = (1..=3).map(QuestionId::new).collect();
        let err = sample_question_ids(&ids, 10, &mut seeded()).unwrap_err();

        assert!(matches!(
            err,
            QuizError::NotEnoughQuestions {
                required: 10,
                available: 3
            }
        ));
    }

    #[tokio::test]
    async fn resolve_creates_session_for_unknown_token() {
        let repo = repo_with_questions(5).await;
        let dir = directory(&repo, 3);
        let stranger = SessionToken::new("unknown").unwrap();

        let resolved = dir.resolve(Some(&stranger)).await.unwrap();

        assert!(resolved.created);
        assert_ne!(resolved.record.token(), &stranger);
        assert_eq!(resolved.record.question_count(), 3);
        assert!(!resolved.record.has_active_game());
        let stored = dir.find(resolved.record.token()).await.unwrap();
        assert_eq!(stored, resolved.record);
    }

    #[tokio::test]
    async fn resolve_returns_active_session() {
        let repo = repo_with_questions(5).await;
        let dir = directory(&repo, 3);
        let first = dir.resolve(None).await.unwrap().record;

        let active = SessionRecord::from_persisted(
            first.token().clone(),
            first.questions().to_vec(),
            0,
            Some(quiz_core::time::fixed_now()),
            0,
            0,
            chrono::Duration::zero(),
            first.started_at(),
            None,
        )
        .unwrap();
        repo.save_session(&active).await.unwrap();

        let again = dir.resolve(Some(first.token())).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.record, active);
    }

    #[tokio::test]
    async fn resolve_reports_small_bank_without_creating() {
        let repo = repo_with_questions(2).await;
        let dir = directory(&repo, 3);

        let err = dir.resolve(None).await.unwrap_err();
        assert!(matches!(err, QuizError::NotEnoughQuestions { .. }));
    }

    #[tokio::test]
    async fn find_reports_missing_session() {
        let repo = repo_with_questions(1).await;
        let dir = directory(&repo, 1);

        let err = dir
            .find(&SessionToken::new("nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::SessionNotFound));
    }
}
