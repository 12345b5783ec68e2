use chrono::Duration;
use quiz_core::model::QuestionDraft;
use quiz_core::round::{AnswerReason, RoundSettings};
use quiz_core::time::fixed_now;
use services::{Clock, QuizService};
use storage::repository::Storage;

#[tokio::test]
async fn full_round_through_quiz_service() {
    let storage = Storage::in_memory();
    let mut answers = std::collections::HashMap::new();
    for i in 0..5_usize {
        let draft = QuestionDraft::new(format!("Question {i}"), ["w", "x", "y", "z"], i % 4)
            .validate()
            .unwrap();
        let id = storage.questions.insert_new_question(&draft).await.unwrap();
        answers.insert(id, i64::try_from(i % 4).unwrap());
    }

    let settings = RoundSettings::from_secs(4, 30, 2).unwrap();
    let t0 = fixed_now();
    let svc = QuizService::from_storage(Clock::fixed(t0), settings, &storage);

    let check_in = svc.check_in(None).await.unwrap();
    assert!(check_in.created);
    assert!(!check_in.stats.has_active_game);
    let token = check_in.token;

    let mut question = svc.start(&token).await.unwrap().next_question.unwrap();
    let mut seen = vec![question.id];

    // Correct, skip, timeout, wrong.
    let svc = svc.with_clock(Clock::fixed(t0 + Duration::seconds(4)));
    let view = svc.submit_answer(&token, answers[&question.id]).await.unwrap();
    assert_eq!(view.reason, AnswerReason::Correct);
    question = view.next_question.unwrap();
    seen.push(question.id);

    let view = svc.submit_answer(&token, -1).await.unwrap();
    assert_eq!(view.reason, AnswerReason::Skipped);
    question = view.next_question.unwrap();
    seen.push(question.id);

    let svc = svc.with_clock(Clock::fixed(t0 + Duration::seconds(60)));
    let view = svc.submit_answer(&token, answers[&question.id]).await.unwrap();
    assert_eq!(view.reason, AnswerReason::Timeout);
    question = view.next_question.unwrap();
    seen.push(question.id);

    let wrong = (answers[&question.id] + 1) % 4;
    let view = svc.submit_answer(&token, wrong).await.unwrap();
    assert_eq!(view.reason, AnswerReason::WrongAnswer);
    assert!(view.next_question.is_none());
    assert!(!view.stats.has_active_game);
    assert_eq!(view.stats.current_index, 0);

    let summary = view.completed_round.unwrap();
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.incorrect, 2);
    assert_eq!(summary.questions, 4);
    // 4s on the first answer, 56s on the timeout, nothing on the skip or the last answer.
    assert_eq!(summary.elapsed_secs, 60);

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 4);

    // The same sequence is replayed on the next round.
    let restarted = svc.start(&token).await.unwrap();
    assert!(restarted.stats.has_active_game);
    assert_eq!(restarted.stats.total_incorrect, 0);
}
