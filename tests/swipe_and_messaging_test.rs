//! Mutual-match and two-phase handshake integration tests against a real
//! Postgres instance.

mod common;

use matchcore::messaging::MessagingService;
use matchcore::quota::QuotaService;
use matchcore::swipes::{Direction, SwipeService};

use common::TestFixture;

#[tokio::test]
async fn mutual_like_then_greeting_then_accept_opens_chat() {
    let fixture = TestFixture::new().await;
    let alice = fixture.seed_user("alice").await;
    let bob = fixture.seed_user("bob").await;

    let swipes = SwipeService::new(fixture.db.clone(), QuotaService::new(fixture.db.clone()));
    let messaging = MessagingService::new(fixture.db.clone());

    swipes.swipe(alice, bob, Direction::Like).await.unwrap();
    swipes.swipe(bob, alice, Direction::Like).await.unwrap();

    let mutuals = swipes.mutual_pairs(alice).await.unwrap();
    assert_eq!(mutuals, vec![bob]);

    let chat = messaging.send_greeting(alice, bob, "hey, saw we matched!").await.unwrap();
    assert_eq!(chat.state, "pending_greeting");

    let chat = messaging.respond_greeting(bob, chat.chat_id, true).await.unwrap();
    assert_eq!(chat.state, "active");

    let reply = messaging.send_message(bob, chat.chat_id, "hi back!").await.unwrap();
    assert_eq!(reply.sender_id, bob);

    let chats = messaging.list_chats(alice).await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].chat.chat_id, chat.chat_id);
}

#[tokio::test]
async fn rejecting_a_greeting_marks_chat_rejected_and_frees_the_pair() {
    let fixture = TestFixture::new().await;
    let alice = fixture.seed_user("alice2").await;
    let bob = fixture.seed_user("bob2").await;

    let swipes = SwipeService::new(fixture.db.clone(), QuotaService::new(fixture.db.clone()));
    let messaging = MessagingService::new(fixture.db.clone());

    swipes.swipe(alice, bob, Direction::Like).await.unwrap();

    let chat = messaging.send_greeting(alice, bob, "hi").await.unwrap();
    let chat = messaging.respond_greeting(bob, chat.chat_id, false).await.unwrap();
    assert_eq!(chat.state, "rejected");

    // The pair is free again: a second greeting attempt should succeed
    // rather than hit the "one open chat per pair" unique index, since the
    // rejected chat is no longer open.
    let second = messaging.send_greeting(alice, bob, "one more try").await.unwrap();
    assert_eq!(second.state, "pending_greeting");
}

#[tokio::test]
async fn greeting_without_a_prior_like_is_rejected() {
    let fixture = TestFixture::new().await;
    let alice = fixture.seed_user("alice3").await;
    let bob = fixture.seed_user("bob3").await;

    let messaging = MessagingService::new(fixture.db.clone());
    let result = messaging.send_greeting(alice, bob, "hi").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn duplicate_swipe_on_same_target_conflicts() {
    let fixture = TestFixture::new().await;
    let alice = fixture.seed_user("alice4").await;
    let bob = fixture.seed_user("bob4").await;

    let swipes = SwipeService::new(fixture.db.clone(), QuotaService::new(fixture.db.clone()));
    swipes.swipe(alice, bob, Direction::Like).await.unwrap();
    let result = swipes.swipe(alice, bob, Direction::Dislike).await;
    assert!(result.is_err());
}
