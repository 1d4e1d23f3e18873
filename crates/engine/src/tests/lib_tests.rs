use std::sync::{Arc, Mutex};

use shared::domain::{OptionId, ParticipantId, QuestionDraft, QuestionId, SessionCode};

use super::*;

fn drafts() -> Vec<QuestionDraft> {
    vec![
        QuestionDraft::new("Favourite language?", &["Rust", "Go", "Zig"]),
        QuestionDraft::new("Tabs or spaces?", &["Tabs", "Spaces"]),
    ]
}

fn live_engine() -> (SessionEngine, SessionCode) {
    let mut engine = SessionEngine::new();
    let id = engine
        .create_presentation("Team sync", &drafts())
        .expect("create")
        .id
        .clone();
    engine.start_presentation();
    (engine, id)
}

fn q(id: &str) -> QuestionId {
    QuestionId::from(id)
}

fn o(id: &str) -> OptionId {
    OptionId::from(id)
}

#[test]
fn session_codes_are_six_uppercase_alphanumerics() {
    for _ in 0..100 {
        let code = ids::new_session_id();
        assert_eq!(code.as_str().len(), ids::SESSION_CODE_LEN);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(ids::is_valid_session_code(&code.as_str().to_lowercase()));
    }
}

#[test]
fn session_code_allocation_skips_taken_codes_and_gives_up_eventually() {
    let first = ids::new_session_id_avoiding(|_| false).expect("free code");
    let second = ids::new_session_id_avoiding(|candidate| candidate == &first).expect("code");
    assert_ne!(first, second);

    let err = ids::new_session_id_avoiding(|_| true).expect_err("every code taken");
    assert!(err.attempts > 0);
}

#[test]
fn participant_ids_are_unique() {
    let a = ids::new_participant_id();
    let b = ids::new_participant_id();
    assert_ne!(a, b);
}

#[test]
fn creation_zeroes_every_option_and_starts_inactive_at_first_question() {
    let mut engine = SessionEngine::new();
    assert_eq!(engine.state(), SessionState::NoSession);

    let presentation = engine
        .create_presentation("  Team sync ", &drafts())
        .expect("create")
        .clone();

    assert_eq!(presentation.title, "Team sync");
    assert_eq!(presentation.current_question_index, 0);
    assert!(!presentation.is_active);
    assert_eq!(engine.state(), SessionState::Created);
    for question in &presentation.questions {
        let tally = engine.tally_for(&question.id).expect("tally entry");
        assert_eq!(tally.len(), question.options.len());
        assert!(tally.values().all(|count| *count == 0));
    }
    assert_eq!(presentation.questions[0].id, q("q1"));
    assert_eq!(presentation.questions[1].options[1].id, o("q2-o2"));
}

#[test]
fn creation_rejects_invalid_input() {
    let mut engine = SessionEngine::new();

    let err = engine.create_presentation("   ", &drafts()).expect_err("title");
    assert_eq!(err, InputError::EmptyTitle);

    let err = engine.create_presentation("T", &[]).expect_err("questions");
    assert_eq!(err, InputError::NoQuestions);

    let err = engine
        .create_presentation("T", &[QuestionDraft::new(" ", &["a", "b"])])
        .expect_err("question text");
    assert_eq!(err, InputError::EmptyQuestion { index: 0 });

    let err = engine
        .create_presentation("T", &[QuestionDraft::new("Q", &["only"])])
        .expect_err("too few options");
    assert!(matches!(err, InputError::OptionCount { actual: 1, .. }));

    let seven = ["1", "2", "3", "4", "5", "6", "7"];
    let err = engine
        .create_presentation("T", &[QuestionDraft::new("Q", &seven)])
        .expect_err("too many options");
    assert!(matches!(err, InputError::OptionCount { actual: 7, .. }));

    let err = engine
        .create_presentation("T", &[QuestionDraft::new("Q", &["a", "  "])])
        .expect_err("empty option");
    assert_eq!(
        err,
        InputError::EmptyOption {
            question: 0,
            option: 1
        }
    );

    assert_eq!(engine.state(), SessionState::NoSession);
}

#[test]
fn creating_again_replaces_without_archiving() {
    let (mut engine, first_id) = live_engine();
    let alice = engine.join_presentation("Alice", first_id.as_str()).expect("join");
    engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q1-o1"))
        .expect("vote");

    let second = engine
        .create_presentation("Another", &drafts())
        .expect("create")
        .clone();

    assert_eq!(engine.history().count(), 0);
    assert_eq!(engine.participant_count(), 0);
    assert_eq!(engine.votes().count(&q("q1"), &o("q1-o1")), 0);
    assert!(!second.is_active);
    assert_eq!(engine.state(), SessionState::Created);
}

#[test]
fn start_without_presentation_is_a_no_op() {
    let mut engine = SessionEngine::new();
    assert!(!engine.start_presentation());
    assert_eq!(engine.state(), SessionState::NoSession);
}

#[test]
fn cursor_stays_within_question_bounds() {
    let (mut engine, _) = live_engine();
    let last = engine.presentation().expect("presentation").questions.len() - 1;

    for _ in 0..5 {
        assert!(!engine.previous_question());
    }
    assert_eq!(engine.presentation().expect("p").current_question_index, 0);

    for _ in 0..10 {
        engine.next_question();
        let index = engine.presentation().expect("p").current_question_index;
        assert!(index <= last);
    }
    assert_eq!(engine.presentation().expect("p").current_question_index, last);
    assert!(!engine.next_question());

    assert!(engine.previous_question());
    assert_eq!(
        engine.current_question().expect("question").id,
        q("q1")
    );
}

#[test]
fn join_matches_code_case_insensitively() {
    let (mut engine, id) = live_engine();

    let handle = engine
        .join_presentation("  Alice ", &id.as_str().to_lowercase())
        .expect("lowercase code joins");
    assert_eq!(handle.name, "Alice");
    let participant = engine.participant(&handle.participant_id).expect("roster");
    assert!(participant.voted_on.is_empty());

    let err = engine
        .join_presentation("Bob", "ZZZZZZ9")
        .expect_err("wrong code");
    assert_eq!(err, JoinError::NoSuchSession);

    let err = engine
        .join_presentation("  ", id.as_str())
        .expect_err("empty name");
    assert_eq!(err, JoinError::InvalidInput(InputError::EmptyName));

    assert_eq!(engine.participant_count(), 1);
}

#[test]
fn join_without_presentation_reports_no_such_session() {
    let mut engine = SessionEngine::new();
    let err = engine.join_presentation("Alice", "ABC123").expect_err("no session");
    assert_eq!(err, JoinError::NoSuchSession);
}

#[test]
fn repeated_votes_only_count_once() {
    let (mut engine, id) = live_engine();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");

    engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q1-o2"))
        .expect("first vote");
    for option in ["q1-o1", "q1-o2", "q1-o3"] {
        let err = engine
            .submit_vote(&alice.participant_id, &q("q1"), &o(option))
            .expect_err("repeat");
        assert_eq!(err, VoteError::AlreadyVoted);
    }

    assert_eq!(engine.votes().total_for(&q("q1")), 1);
    assert_eq!(engine.votes().count(&q("q1"), &o("q1-o2")), 1);
    assert!(engine.has_voted(&alice.participant_id, &q("q1")));
    assert!(!engine.has_voted(&alice.participant_id, &q("q2")));
    assert_eq!(engine.votes_completed_by(&alice.participant_id), 1);
}

#[test]
fn votes_from_unknown_participants_or_for_unknown_targets_are_rejected() {
    let (mut engine, id) = live_engine();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");

    let err = engine
        .submit_vote(&ParticipantId::from("user-ghost"), &q("q1"), &o("q1-o1"))
        .expect_err("unknown participant");
    assert_eq!(err, VoteError::UnknownParticipant);

    let err = engine
        .submit_vote(&alice.participant_id, &q("q9"), &o("q9-o1"))
        .expect_err("unknown question");
    assert_eq!(err, VoteError::InvalidTarget);

    let err = engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q2-o1"))
        .expect_err("option from another question");
    assert_eq!(err, VoteError::InvalidTarget);

    assert!(!engine.has_voted(&alice.participant_id, &q("q1")));
    assert_eq!(engine.votes().total_for(&q("q1")), 0);

    engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q1-o1"))
        .expect("valid vote still accepted");
}

#[test]
fn reset_clears_votes_and_roster_but_keeps_structure() {
    let (mut engine, id) = live_engine();
    engine.next_question();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");
    engine
        .submit_vote(&alice.participant_id, &q("q2"), &o("q2-o1"))
        .expect("vote");
    let before = engine.presentation().expect("p").clone();

    assert!(engine.reset_presentation());

    let after = engine.presentation().expect("p");
    assert_eq!(after, &before);
    assert_eq!(engine.participant_count(), 0);
    assert_eq!(engine.votes().total_for(&q("q2")), 0);
    assert_eq!(engine.state(), SessionState::Live);
    assert_eq!(
        engine
            .submit_vote(&alice.participant_id, &q("q2"), &o("q2-o1"))
            .expect_err("roster cleared"),
        VoteError::UnknownParticipant
    );
}

#[test]
fn archived_tally_is_independent_of_later_sessions() {
    let (mut engine, id) = live_engine();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");
    engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q1-o3"))
        .expect("vote");

    let record = engine.start_new_presentation().expect("archived").clone();
    assert_eq!(engine.history().count(), 1);
    assert_eq!(engine.state(), SessionState::NoSession);
    assert_eq!(record.presentation.id, id);
    assert_eq!(record.votes.count(&q("q1"), &o("q1-o3")), 1);

    let next_id = engine
        .create_presentation("Round two", &drafts())
        .expect("create")
        .id
        .clone();
    engine.start_presentation();
    let bob = engine.join_presentation("Bob", next_id.as_str()).expect("join");
    engine
        .submit_vote(&bob.participant_id, &q("q1"), &o("q1-o3"))
        .expect("vote");
    engine.reset_presentation();

    let archived = &engine.history().list()[0];
    assert_eq!(archived.votes, record.votes);
    assert_eq!(archived.votes.count(&q("q1"), &o("q1-o3")), 1);
}

#[test]
fn start_new_without_presentation_archives_nothing() {
    let mut engine = SessionEngine::new();
    assert!(engine.start_new_presentation().is_none());
    assert_eq!(engine.history().count(), 0);
}

#[test]
fn snapshot_lists_roster_in_join_order_without_ids() {
    let (mut engine, id) = live_engine();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");
    engine.join_presentation("Bob", id.as_str()).expect("join");
    engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q1-o1"))
        .expect("vote");

    let snapshot = engine.snapshot().expect("snapshot");
    assert_eq!(snapshot.participant_count, 2);
    let names: Vec<_> = snapshot.participants.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob"]);
    assert!(snapshot.participants[0].voted_on.contains(&q("q1")));

    let json = serde_json::to_string(&snapshot).expect("json");
    assert!(!json.contains(alice.participant_id.as_str()));
}

#[test]
fn concurrent_votes_are_not_lost() {
    let (mut engine, id) = live_engine();
    let voters: Vec<_> = (0..32)
        .map(|i| {
            engine
                .join_presentation(&format!("voter-{i}"), id.as_str())
                .expect("join")
                .participant_id
        })
        .collect();
    let engine = Arc::new(Mutex::new(engine));

    let handles: Vec<_> = voters
        .into_iter()
        .enumerate()
        .map(|(i, participant_id)| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let option = o(if i % 2 == 0 { "q1-o1" } else { "q1-o2" });
                engine
                    .lock()
                    .expect("lock")
                    .submit_vote(&participant_id, &q("q1"), &option)
                    .expect("vote");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let engine = engine.lock().expect("lock");
    assert_eq!(engine.votes().total_for(&q("q1")), 32);
    assert_eq!(engine.votes().count(&q("q1"), &o("q1-o1")), 16);
}

#[test]
fn archive_keeps_completion_order() {
    let mut archive = HistoryArchive::new();
    let mut engine = SessionEngine::new();
    for title in ["first", "second", "third"] {
        engine.create_presentation(title, &drafts()).expect("create");
        let record = engine.start_new_presentation().expect("archived").clone();
        archive.append(record);
    }
    let titles: Vec<_> = archive
        .list()
        .iter()
        .map(|record| record.presentation.title.as_str())
        .collect();
    assert_eq!(titles, ["first", "second", "third"]);
    assert_eq!(archive.count(), 3);
    assert_eq!(engine.history().count(), 3);
}

#[test]
fn participant_mode_follows_activity_and_votes() {
    let (mut engine, id) = live_engine();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");

    assert_eq!(
        resolve_participant_mode(None, None, None),
        ViewMode::ParticipantWaiting
    );

    let mut inactive = engine.presentation().expect("p").clone();
    inactive.is_active = false;
    assert_eq!(
        resolve_participant_mode(
            Some(&inactive),
            engine.participant(&alice.participant_id),
            inactive.current_question()
        ),
        ViewMode::ParticipantWaiting
    );

    let mode = resolve_participant_mode(
        engine.presentation(),
        engine.participant(&alice.participant_id),
        engine.current_question(),
    );
    assert_eq!(mode, ViewMode::ParticipantVote);

    engine
        .submit_vote(&alice.participant_id, &q("q1"), &o("q1-o1"))
        .expect("vote");
    let mode = resolve_participant_mode(
        engine.presentation(),
        engine.participant(&alice.participant_id),
        engine.current_question(),
    );
    assert_eq!(mode, ViewMode::ParticipantVoted);

    engine.next_question();
    let mode = resolve_participant_mode(
        engine.presentation(),
        engine.participant(&alice.participant_id),
        engine.current_question(),
    );
    assert_eq!(mode, ViewMode::ParticipantVote);
}

#[test]
fn admin_screens_follow_the_transition_table() {
    let mut view = ViewController::new();
    let none = SessionView::default();
    assert_eq!(view.mode(), ViewMode::Home);

    assert_eq!(
        view.apply(Intent::OpenAdminLogin, none).expect("login"),
        ViewMode::AdminLogin
    );
    assert_eq!(
        view.apply(Intent::LoginSucceeded, none).expect("dashboard"),
        ViewMode::AdminDashboard
    );
    assert_eq!(
        view.apply(Intent::OpenPastSessions, none).expect("history"),
        ViewMode::AdminPastSessions
    );
    assert_eq!(
        view.apply(Intent::CloseHistory, none).expect("back"),
        ViewMode::AdminDashboard
    );
    assert_eq!(
        view.apply(Intent::SessionUpdated, none).expect("update ignored"),
        ViewMode::AdminDashboard
    );
    assert_eq!(view.apply(Intent::GoHome, none).expect("home"), ViewMode::Home);
}

#[test]
fn invalid_intents_leave_the_mode_unchanged() {
    let mut view = ViewController::new();
    let none = SessionView::default();

    let err = view
        .apply(Intent::OpenPastSessions, none)
        .expect_err("history needs the dashboard");
    assert_eq!(err.from, ViewMode::Home);
    assert_eq!(view.mode(), ViewMode::Home);

    view.apply(Intent::OpenParticipantJoin, none).expect("join screen");
    let err = view
        .apply(Intent::VoteSettled, none)
        .expect_err("no session joined yet");
    assert_eq!(err.intent, Intent::VoteSettled);
    assert_eq!(view.mode(), ViewMode::ParticipantJoin);
}

#[test]
fn session_updates_re_resolve_participant_screens() {
    let mut engine = SessionEngine::new();
    let id = engine
        .create_presentation("Later", &drafts())
        .expect("create")
        .id
        .clone();
    let alice = engine.join_presentation("Alice", id.as_str()).expect("join");

    let mut view = ViewController::new();
    view.apply(Intent::OpenParticipantJoin, SessionView::default())
        .expect("join screen");
    let mode = view
        .apply(
            Intent::JoinSucceeded,
            SessionView {
                presentation: engine.presentation(),
                participant: engine.participant(&alice.participant_id),
            },
        )
        .expect("joined");
    assert_eq!(mode, ViewMode::ParticipantWaiting);

    engine.start_presentation();
    let mode = view
        .apply(
            Intent::SessionUpdated,
            SessionView {
                presentation: engine.presentation(),
                participant: engine.participant(&alice.participant_id),
            },
        )
        .expect("update");
    assert_eq!(mode, ViewMode::ParticipantVote);
}
