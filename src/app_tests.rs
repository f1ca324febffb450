use super::*;
use crate::db::Db;
use crate::models::{test_group, test_question};

async fn test_app() -> App {
    let db = Db::in_memory().await.unwrap();
    let client = GeminiClient::new("test-key".to_string());
    App::new(db, client, AppConfig::default()).await.unwrap()
}

fn answer_group_correctly(app: &mut App) {
    let group = app.current_group().unwrap().clone();
    for (slot, person) in Person::ALL.iter().enumerate() {
        let q = group.questions.iter().find(|q| q.person == *person).unwrap();
        app.conj.answers[slot] = q.answer.clone();
    }
}

#[tokio::test]
async fn new_app_starts_on_menu() {
    let app = test_app().await;
    assert_eq!(app.screen, Screen::Menu);
    assert_eq!(app.conj_phase, Phase::Idle);
    assert_eq!(app.conj.score, 0);
    assert!(app.conj_wrong.is_empty());
}

#[tokio::test]
async fn review_with_empty_wrong_set_is_rejected() {
    let mut app = test_app().await;
    app.start_conjugation_review();
    assert_eq!(app.conj_phase, Phase::Idle);

    app.start_grammar_review();
    assert_eq!(app.grammar_phase, Phase::Idle);
}

#[tokio::test]
async fn correct_group_scores_once_and_removes_in_review() {
    let mut app = test_app().await;
    let mut group = test_group("manger", "présent");
    group.questions[0].answer = "je mange".to_string();
    group.questions[1].answer = "nous mangeons".to_string();
    group.questions[2].answer = "ils mangent".to_string();
    app.conj_wrong.insert_group(&group);
    app.db.save_conjugation_wrong(app.conj_wrong.items()).await.unwrap();

    app.start_conjugation_review();
    assert_eq!(app.conj_phase, Phase::Presenting);

    // Casing and stray whitespace must not matter.
    app.conj.answers[0] = "  JE MANGE ".to_string();
    app.conj.answers[1] = "Nous Mangeons".to_string();
    app.conj.answers[2] = "ils mangent".to_string();
    app.submit_conjugation().await.unwrap();

    assert_eq!(app.conj_phase, Phase::Graded);
    assert_eq!(app.conj.last_correct, Some(true));
    assert_eq!(app.conj.score, 1);
    assert!(app.conj_wrong.is_empty());
    assert!(app.db.load_conjugation_wrong().await.unwrap().is_empty());
}

#[tokio::test]
async fn one_wrong_sub_answer_fails_the_group() {
    let mut app = test_app().await;
    app.conj.groups = vec![test_group("manger", "présent")];
    app.conj_phase = Phase::Presenting;

    answer_group_correctly(&mut app);
    app.conj.answers[2] = "faux".to_string();
    app.submit_conjugation().await.unwrap();

    assert_eq!(app.conj.last_correct, Some(false));
    assert_eq!(app.conj.score, 0);
    assert_eq!(app.conj_wrong.len(), 3);
    // Persisted immediately.
    assert_eq!(app.db.load_conjugation_wrong().await.unwrap().len(), 3);
}

#[tokio::test]
async fn correct_answer_in_fresh_session_keeps_wrong_set_by_default() {
    let mut app = test_app().await;
    let group = test_group("manger", "présent");
    app.conj_wrong.insert_group(&group);

    app.conj.groups = vec![group];
    app.conj.review_mode = false;
    app.conj_phase = Phase::Presenting;

    answer_group_correctly(&mut app);
    app.submit_conjugation().await.unwrap();

    assert_eq!(app.conj.last_correct, Some(true));
    assert_eq!(app.conj_wrong.len(), 3);
}

#[tokio::test]
async fn remove_on_correct_always_applies_in_fresh_sessions() {
    let mut app = test_app().await;
    app.config.remove_on_correct_always = true;

    let group = test_group("manger", "présent");
    app.conj_wrong.insert_group(&group);
    app.conj.groups = vec![group];
    app.conj_phase = Phase::Presenting;

    answer_group_correctly(&mut app);
    app.submit_conjugation().await.unwrap();
    assert!(app.conj_wrong.is_empty());
}

#[tokio::test]
async fn session_advances_then_completes() {
    let mut app = test_app().await;
    app.conj.groups = vec![test_group("a", "présent"), test_group("b", "présent")];
    app.conj_phase = Phase::Presenting;

    answer_group_correctly(&mut app);
    app.submit_conjugation().await.unwrap();
    app.next_conjugation();
    assert_eq!(app.conj_phase, Phase::Presenting);
    assert_eq!(app.conj.index, 1);

    answer_group_correctly(&mut app);
    app.submit_conjugation().await.unwrap();
    app.next_conjugation();
    assert_eq!(app.conj_phase, Phase::Complete);
    assert_eq!(app.conj.score, 2);
}

#[tokio::test]
async fn deleting_last_group_clamps_index() {
    let mut app = test_app().await;
    let groups = vec![
        test_group("a", "présent"),
        test_group("b", "présent"),
        test_group("c", "présent"),
    ];
    for g in &groups {
        app.conj_wrong.insert_group(g);
    }
    app.conj.groups = groups;
    app.conj.review_mode = true;
    app.conj.index = 2;
    app.conj_phase = Phase::Presenting;

    app.delete_current_group().await.unwrap();

    assert_eq!(app.conj.index, 1);
    assert_eq!(app.conj.groups.len(), 2);
    assert_eq!(app.conj_phase, Phase::Presenting);
    assert_eq!(app.conj_wrong.len(), 6);
}

#[tokio::test]
async fn deleting_only_group_returns_to_idle() {
    let mut app = test_app().await;
    let group = test_group("a", "présent");
    app.conj_wrong.insert_group(&group);
    app.conj.groups = vec![group];
    app.conj.review_mode = true;
    app.conj_phase = Phase::Presenting;

    app.delete_current_group().await.unwrap();
    assert_eq!(app.conj_phase, Phase::Idle);
    assert!(app.conj_wrong.is_empty());
}

#[tokio::test]
async fn delete_is_review_only() {
    let mut app = test_app().await;
    app.conj.groups = vec![test_group("a", "présent")];
    app.conj.review_mode = false;
    app.conj_phase = Phase::Presenting;

    app.delete_current_group().await.unwrap();
    assert_eq!(app.conj.groups.len(), 1);
}

#[tokio::test]
async fn clearing_wrong_set_erases_persisted_copy() {
    let mut app = test_app().await;
    app.conj_wrong
        .insert(test_question("manger", "présent", Person::Je, "mange"));
    app.db.save_conjugation_wrong(app.conj_wrong.items()).await.unwrap();

    app.clear_conjugation_wrong().await.unwrap();
    assert!(app.conj_wrong.is_empty());
    assert!(app.db.load_conjugation_wrong().await.unwrap().is_empty());
}

#[tokio::test]
async fn grammar_grading_and_review_removal() {
    let mut app = test_app().await;
    let q = GrammarQuestion {
        id: "g-1".to_string(),
        sentence: "Je ____ au travail.".to_string(),
        answer: "vais".to_string(),
    };
    app.grammar_wrong.insert(q.clone());
    app.db.save_grammar_wrong(app.grammar_wrong.items()).await.unwrap();

    app.start_grammar_review();
    assert_eq!(app.grammar_phase, Phase::Presenting);

    app.grammar.input = " VAIS ".to_string();
    app.submit_grammar().await.unwrap();

    assert_eq!(app.grammar.last_correct, Some(true));
    assert_eq!(app.grammar.score, 1);
    assert!(app.grammar_wrong.is_empty());
    assert!(app.db.load_grammar_wrong().await.unwrap().is_empty());

    app.next_grammar();
    assert_eq!(app.grammar_phase, Phase::Complete);
}

#[tokio::test]
async fn wrong_grammar_answer_is_tracked_once() {
    let mut app = test_app().await;
    let q = GrammarQuestion {
        id: "g-1".to_string(),
        sentence: "Nous ____ du pain.".to_string(),
        answer: "achetons".to_string(),
    };
    app.grammar.questions = vec![q.clone(), q];
    app.grammar_phase = Phase::Presenting;

    app.grammar.input = "achetez".to_string();
    app.submit_grammar().await.unwrap();
    app.next_grammar();
    app.grammar.input = "achète".to_string();
    app.submit_grammar().await.unwrap();

    assert_eq!(app.grammar_wrong.len(), 1);
}

#[tokio::test]
async fn speaking_accepts_only_unseen_questions() {
    let mut app = test_app().await;
    app.speaking.stored.push(SpeakingQuestion {
        id: "old".to_string(),
        question: "Pourquoi le Canada ?".to_string(),
        answer: "...".to_string(),
        date: "2025-07-22".to_string(),
    });

    let incoming = vec![
        SpeakingQuestion {
            id: "new-1".to_string(),
            question: "Pourquoi le Canada ?".to_string(), // duplicate text
            answer: "...".to_string(),
            date: "2025-07-23".to_string(),
        },
        SpeakingQuestion {
            id: "new-2".to_string(),
            question: "Parlez-moi de votre travail.".to_string(),
            answer: "...".to_string(),
            date: "2025-07-23".to_string(),
        },
    ];
    app.accept_speaking(incoming).await.unwrap();

    assert_eq!(app.speaking.stored.len(), 2);
    assert_eq!(app.speaking.latest, vec!["new-2".to_string()]);
    assert_eq!(app.db.load_speaking_questions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_selected_speaking_clamps_selection() {
    let mut app = test_app().await;
    for i in 0..3 {
        app.speaking.stored.push(SpeakingQuestion {
            id: format!("q-{}", i),
            question: format!("Question {} ?", i),
            answer: "...".to_string(),
            date: "2025-07-22".to_string(),
        });
    }
    app.speaking.show_all = true;
    app.speaking.selected = 2;

    app.delete_selected_speaking().await.unwrap();
    assert_eq!(app.speaking.stored.len(), 2);
    assert_eq!(app.speaking.selected, 1);
}

#[tokio::test]
async fn failed_generation_returns_to_idle() {
    let mut app = test_app().await;
    app.conj_phase = Phase::Loading;
    let (tx, rx) = oneshot::channel();
    app.pending = Some(rx);
    assert!(tx
        .send(GenOutcome::Conjugation(Err(GenerateError::Empty)))
        .is_ok());

    app.poll_generation().await.unwrap();

    assert_eq!(app.conj_phase, Phase::Idle);
    assert!(app.status.is_some());
    assert!(!app.loading());
}

#[tokio::test]
async fn dropped_generation_task_returns_to_idle() {
    let mut app = test_app().await;
    app.grammar_phase = Phase::Loading;
    let (tx, rx) = oneshot::channel::<GenOutcome>();
    app.pending = Some(rx);
    drop(tx);

    app.poll_generation().await.unwrap();

    assert_eq!(app.grammar_phase, Phase::Idle);
    assert!(app.status.is_some());
    assert!(!app.loading());
}

#[tokio::test]
async fn starting_while_a_call_is_in_flight_is_a_noop() {
    let mut app = test_app().await;
    let (_tx, rx) = oneshot::channel::<GenOutcome>();
    app.pending = Some(rx);

    app.start_conjugation_new();
    assert_eq!(app.conj_phase, Phase::Idle);

    app.grammar.theme = "au restaurant".to_string();
    app.start_grammar_new().await.unwrap();
    assert_eq!(app.grammar_phase, Phase::Idle);

    app.conj_wrong.insert_group(&test_group("manger", "présent"));
    app.start_conjugation_review();
    assert_eq!(app.conj_phase, Phase::Idle);

    assert!(app.loading());
}

#[tokio::test]
async fn browsing_stored_speaking_is_grouped_newest_first() {
    let mut app = test_app().await;
    for (i, date) in ["2025-07-20", "2025-07-22", "2025-07-21", "2025-07-22"]
        .iter()
        .enumerate()
    {
        app.speaking.stored.push(SpeakingQuestion {
            id: format!("q-{}", i),
            question: format!("Question {} ?", i),
            answer: "...".to_string(),
            date: date.to_string(),
        });
    }
    app.speaking.show_all = true;

    let visible = app.visible_speaking();
    let dates: Vec<&str> = visible.iter().map(|q| q.date.as_str()).collect();
    assert_eq!(dates, vec!["2025-07-22", "2025-07-22", "2025-07-21", "2025-07-20"]);
    // Insertion order is kept within a date.
    assert_eq!(visible[0].id, "q-1");
    assert_eq!(visible[1].id, "q-3");
}

#[tokio::test]
async fn menu_navigation_wraps() {
    let mut app = test_app().await;
    app.handle_key(KeyEvent::from(KeyCode::Up)).await.unwrap();
    assert_eq!(app.menu_selection, 2);
    app.handle_key(KeyEvent::from(KeyCode::Down)).await.unwrap();
    assert_eq!(app.menu_selection, 0);
    app.handle_key(KeyEvent::from(KeyCode::Enter)).await.unwrap();
    assert_eq!(app.screen, Screen::Conjugation);
}

#[tokio::test]
async fn typing_fills_focused_conjugation_slot() {
    let mut app = test_app().await;
    app.screen = Screen::Conjugation;
    app.conj.groups = vec![test_group("manger", "présent")];
    app.conj_phase = Phase::Presenting;

    app.handle_key(KeyEvent::from(KeyCode::Char('j'))).await.unwrap();
    app.handle_key(KeyEvent::from(KeyCode::Char('e'))).await.unwrap();
    app.handle_key(KeyEvent::from(KeyCode::Tab)).await.unwrap();
    app.handle_key(KeyEvent::from(KeyCode::Char('n'))).await.unwrap();
    app.handle_key(KeyEvent::from(KeyCode::Backspace)).await.unwrap();

    assert_eq!(app.conj.answers[0], "je");
    assert_eq!(app.conj.answers[1], "");
    assert_eq!(app.conj.focus, 1);
}
