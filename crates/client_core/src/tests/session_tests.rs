use super::*;
use crate::tests::{drafts, spawn_poll_server};
use shared::protocol::{SuggestedPresentation, SuggestedQuestion};

#[tokio::test]
async fn participant_moves_between_vote_voted_and_waiting() {
    let client = PollClient::new(spawn_poll_server().await);
    let mut admin = AdminConsole::login(client.clone()).await.expect("login");
    assert_eq!(admin.mode(), ViewMode::AdminDashboard);
    admin.create("Lunch", drafts()).await.expect("create");
    let code = admin.session().expect("session").presentation.id.clone();

    let mut alice = ParticipantSession::join(client.clone(), "Alice", code.as_str())
        .await
        .expect("join");
    assert_eq!(alice.mode(), ViewMode::ParticipantWaiting);

    admin.start().await.expect("start");
    let update = ServerEvent::SessionUpdated {
        snapshot: admin.session().expect("session").clone(),
    };
    assert_eq!(
        alice.apply_event(&update).expect("event"),
        Some(ViewMode::ParticipantVote)
    );

    assert!(alice.vote(&OptionId::from("q1-o2")).await.expect("vote"));
    assert_eq!(alice.mode(), ViewMode::ParticipantVoted);
    assert!(alice.has_voted_current());
    assert!(!alice.vote(&OptionId::from("q1-o1")).await.expect("repeat"));
    assert_eq!(alice.mode(), ViewMode::ParticipantVoted);

    admin.next().await.expect("next");
    assert_eq!(alice.refresh().await.expect("refresh"), ViewMode::ParticipantVote);

    admin.refresh().await.expect("refresh");
    let (question, rows) = admin.current_chart().expect("chart");
    assert_eq!(question.text, "Tabs or spaces?");
    assert!(rows.iter().all(|row| row.votes == 0));

    admin.previous().await.expect("previous");
    let (_, rows) = admin.current_chart().expect("chart");
    assert_eq!(rows[1].votes, 1);
    assert_eq!(rows[1].percent, 100.0);

    let closed = ServerEvent::SessionClosed {
        session_id: code.clone(),
    };
    admin.start_new().await.expect("start new");
    assert_eq!(
        alice.apply_event(&closed).expect("event"),
        Some(ViewMode::ParticipantWaiting)
    );
    assert!(alice.snapshot().is_none());
    assert_eq!(alice.leave(), ViewMode::Home);
}

#[tokio::test]
async fn events_for_other_sessions_are_ignored() {
    let client = PollClient::new(spawn_poll_server().await);
    let mut admin = AdminConsole::login(client.clone()).await.expect("login");
    admin.create("Mine", drafts()).await.expect("create");
    admin.start().await.expect("start");
    let code = admin.session().expect("session").presentation.id.clone();

    let mut bob = ParticipantSession::join(client.clone(), "Bob", code.as_str())
        .await
        .expect("join");
    let mut other = AdminConsole::login(client).await.expect("login");
    other.create("Theirs", drafts()).await.expect("create");
    let foreign = ServerEvent::SessionUpdated {
        snapshot: other.session().expect("session").clone(),
    };

    assert_eq!(bob.apply_event(&foreign).expect("event"), None);
    assert!(!admin.apply_event(&foreign));
    assert_eq!(bob.mode(), ViewMode::ParticipantVote);
}

#[tokio::test]
async fn admin_history_view_round_trip() {
    let client = PollClient::new(spawn_poll_server().await);
    let mut admin = AdminConsole::login(client).await.expect("login");

    admin
        .create_from_suggestion(SuggestedPresentation {
            title: "Space".to_string(),
            questions: vec![SuggestedQuestion {
                question: "Best planet?".to_string(),
                options: vec!["Mars".into(), "Venus".into(), "Earth".into()],
            }],
        })
        .await
        .expect("create");
    admin.start().await.expect("start");
    admin.reset().await.expect("reset");
    admin.start_new().await.expect("archive");
    assert!(admin.session().is_none());
    assert_eq!(admin.state().archived_count, 1);

    let records = admin.open_history().await.expect("history");
    assert_eq!(admin.mode(), ViewMode::AdminPastSessions);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].presentation.title, "Space");

    assert_eq!(admin.close_history().expect("close"), ViewMode::AdminDashboard);
    assert!(admin.close_history().is_err());
    assert_eq!(admin.logout(), ViewMode::Home);
}

#[tokio::test]
async fn resume_reattaches_to_a_console() {
    let client = PollClient::new(spawn_poll_server().await);
    let mut admin = AdminConsole::login(client.clone()).await.expect("login");
    admin.create("Again", drafts()).await.expect("create");

    let resumed = AdminConsole::resume(client, admin.console_id().clone())
        .await
        .expect("resume");
    assert_eq!(resumed.mode(), ViewMode::AdminDashboard);
    assert_eq!(
        resumed.session().expect("session").presentation.title,
        "Again"
    );
}

#[tokio::test]
async fn participant_dropped_by_reset_is_told_to_rejoin() {
    let client = PollClient::new(spawn_poll_server().await);
    let mut admin = AdminConsole::login(client.clone()).await.expect("login");
    admin.create("Retro", drafts()).await.expect("create");
    admin.start().await.expect("start");
    let code = admin.session().expect("session").presentation.id.clone();

    let mut carol = ParticipantSession::join(client.clone(), "Carol", code.as_str())
        .await
        .expect("join");
    assert!(carol.vote(&OptionId::from("q1-o1")).await.expect("vote"));
    assert_eq!(carol.mode(), ViewMode::ParticipantVoted);

    admin.reset().await.expect("reset");
    admin.next().await.expect("next");
    carol.refresh().await.expect("refresh");
    assert_eq!(carol.mode(), ViewMode::ParticipantVote);

    let err = carol
        .vote(&OptionId::from("q2-o1"))
        .await
        .expect_err("roster was cleared");
    let removed = err.downcast_ref::<RemovedFromSession>().expect("removed");
    assert_eq!(removed.0, code);
    assert_eq!(carol.mode(), ViewMode::Home);
    assert!(carol.snapshot().is_none());

    let mut again = ParticipantSession::join(client, "Carol", code.as_str())
        .await
        .expect("rejoin");
    assert!(again.vote(&OptionId::from("q2-o1")).await.expect("vote again"));
}
