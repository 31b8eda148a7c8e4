mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{auth_user, TestApp};
use secret_santa::domain::models::event::{Event, NewEvent};
use secret_santa::domain::models::invite::Invite;
use secret_santa::domain::models::user::UserProfile;
use secret_santa::domain::ports::IdentityProvider;
use secret_santa::domain::services::event_service::{EventListWatch, EventWatch};
use secret_santa::domain::services::invitation_service::InviteListWatch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

async fn create_event(app: &TestApp, organizer_id: &str) -> String {
    app.state
        .event_service
        .create_event(
            organizer_id,
            &format!("Name of {organizer_id}"),
            NewEvent {
                name: "Xmas".to_string(),
                description: String::new(),
                min_participants: None,
            },
        )
        .await
        .unwrap()
}

async fn next_event(watch: &mut EventWatch) -> Option<Event> {
    timeout(WAIT, watch.next())
        .await
        .expect("timed out waiting for event emission")
        .unwrap()
}

async fn next_events(watch: &mut EventListWatch) -> Vec<Event> {
    timeout(WAIT, watch.next())
        .await
        .expect("timed out waiting for event list emission")
        .unwrap()
}

async fn next_invites(watch: &mut InviteListWatch) -> Vec<Invite> {
    timeout(WAIT, watch.next())
        .await
        .expect("timed out waiting for invite list emission")
        .unwrap()
}

#[tokio::test]
async fn test_watch_absent_event_emits_none_first() {
    let app = TestApp::new().await;
    let mut watch = app
        .state
        .event_service
        .watch_event("never-created")
        .await
        .unwrap();
    assert!(next_event(&mut watch).await.is_none());
}

#[tokio::test]
async fn test_watch_event_emits_snapshot_per_change() {
    let app = TestApp::new().await;
    let svc = &app.state.event_service;
    let event_id = create_event(&app, "alice").await;

    let mut watch = svc.watch_event(&event_id).await.unwrap();
    let initial = next_event(&mut watch).await.expect("initial snapshot missing");
    assert_eq!(initial.participants.len(), 1);

    svc.add_participant(&event_id, "bob", "", "Bob").await.unwrap();
    let updated = next_event(&mut watch).await.expect("update snapshot missing");
    assert_eq!(updated.participants.len(), 2);

    svc.delete_event(&event_id).await.unwrap();
    assert!(next_event(&mut watch).await.is_none(), "deletion must read as absent");
}

#[tokio::test]
async fn test_watch_event_burst_delivers_final_state() {
    let app = TestApp::new().await;
    let svc = &app.state.event_service;
    let event_id = create_event(&app, "alice").await;

    let mut watch = svc.watch_event(&event_id).await.unwrap();
    next_event(&mut watch).await.expect("initial snapshot missing");

    for user in ["bob", "carol", "dave"] {
        svc.add_participant(&event_id, user, "", user).await.unwrap();
    }

    // Intermediate snapshots may coalesce under lag; the final state must
    // still arrive.
    let settled = timeout(WAIT, async {
        loop {
            let event = watch.next().await.unwrap().expect("event vanished");
            if event.participants.len() == 4 {
                return event;
            }
        }
    })
    .await
    .expect("final state never arrived");
    assert_eq!(settled.participants.len(), 4);
}

#[tokio::test]
async fn test_cancelled_watch_leaves_store_usable() {
    let app = TestApp::new().await;
    let svc = &app.state.event_service;
    let event_id = create_event(&app, "alice").await;

    let mut watch = svc.watch_event(&event_id).await.unwrap();
    next_event(&mut watch).await.expect("initial snapshot missing");
    watch.cancel();

    // Writers must not block on an abandoned subscription.
    svc.add_participant(&event_id, "bob", "", "Bob").await.unwrap();
    svc.add_participant(&event_id, "carol", "", "Carol").await.unwrap();

    let mut fresh = svc.watch_event(&event_id).await.unwrap();
    let event = next_event(&mut fresh).await.unwrap();
    assert_eq!(event.participants.len(), 3);
}

#[tokio::test]
async fn test_watch_user_events_follows_membership() {
    let app = TestApp::new().await;
    let svc = &app.state.event_service;

    let mut watch = svc.watch_user_events("alice").await.unwrap();
    assert!(next_events(&mut watch).await.is_empty(), "nothing yet");

    // Someone else's event changes the collection but not Alice's list.
    let event_id = create_event(&app, "bob").await;
    assert!(next_events(&mut watch).await.is_empty());

    svc.add_participant(&event_id, "alice", "alice@example.com", "Alice")
        .await
        .unwrap();
    let joined = next_events(&mut watch).await;
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].id, event_id);

    svc.remove_participant(&event_id, "alice").await.unwrap();
    assert!(next_events(&mut watch).await.is_empty());
}

#[tokio::test]
async fn test_watch_pending_invites_live_inbox() {
    let app = TestApp::new().await;
    let event_id = create_event(&app, "alice").await;
    let invites = &app.state.invitation_service;

    let mut inbox = invites.watch_pending_invites("bob").await.unwrap();
    assert!(next_invites(&mut inbox).await.is_empty());

    let invite_id = invites
        .create_invite(&event_id, "alice", "bob", None)
        .await
        .unwrap();
    let pending = next_invites(&mut inbox).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, invite_id);

    invites.accept_invite(&invite_id, "bob").await.unwrap();
    assert!(
        next_invites(&mut inbox).await.is_empty(),
        "accepted invite must leave the inbox"
    );
}

#[tokio::test]
async fn test_watch_user_profile_updates() {
    let app = TestApp::new().await;
    let users = &app.state.user_service;

    let mut watch = users.watch_user("bob").await.unwrap();
    let initial = timeout(WAIT, watch.next()).await.unwrap().unwrap();
    assert!(initial.is_none(), "no profile on record yet");

    users
        .save_user(
            "bob",
            &UserProfile {
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
            },
        )
        .await
        .unwrap();
    let saved = timeout(WAIT, watch.next())
        .await
        .unwrap()
        .unwrap()
        .expect("profile missing");
    assert_eq!(saved.name, "Bob");
    assert_eq!(saved.email, "bob@example.com");
    watch.cancel();
}

#[tokio::test]
async fn test_session_changes_track_sign_in_and_out() {
    let app = TestApp::new().await;
    let identity = &app.state.identity;

    let mut sessions = identity.session_changes();
    let initial = timeout(WAIT, sessions.next()).await.unwrap().unwrap();
    assert!(initial.is_none(), "nobody signed in yet");

    identity.sign_in(auth_user("alice", "Alice"));
    let signed_in = timeout(WAIT, sessions.next()).await.unwrap().unwrap();
    assert_eq!(signed_in.expect("expected a session").id, "alice");

    identity.sign_out();
    let signed_out = timeout(WAIT, sessions.next()).await.unwrap().unwrap();
    assert!(signed_out.is_none());
}

#[tokio::test]
async fn test_current_user_through_the_port() {
    let app = TestApp::new().await;
    let identity: Arc<dyn IdentityProvider> = app.state.identity.clone();

    assert!(identity.current_user().await.is_none());

    app.state.identity.sign_in(auth_user("alice", "Alice"));
    let user = identity.current_user().await.expect("signed in");
    assert_eq!(user.id, "alice");
    assert_eq!(user.display_name, "Alice");

    app.state.identity.sign_out();
    assert!(identity.current_user().await.is_none());
}
