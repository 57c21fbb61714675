//! End-to-end conversation scenarios over in-memory storage.

use whispergrid_client::{Client, ClientError, ClientEvent, ReplyOptions};
use whispergrid_core::{MemoryStorage, OrderingError, ThreadId};
use whispergrid_crypto::SigningKeyPair;
use whispergrid_proto::{Body, SignedToken, Subject, TokenHeader};

fn pair() -> (Client<MemoryStorage>, Client<MemoryStorage>) {
    let alice = Client::generate(MemoryStorage::new(), "alice-pw").unwrap();
    let bob = Client::generate(MemoryStorage::new(), "bob-pw").unwrap();
    (alice, bob)
}

/// Run the invitation handshake and return the shared thread id.
fn handshake(alice: &mut Client<MemoryStorage>, bob: &mut Client<MemoryStorage>) -> ThreadId {
    let invitation = alice.create_invitation("Alice", Some("hi")).unwrap();
    let reply = bob
        .reply_to_invitation(invitation.as_str(), "hello", &ReplyOptions::default())
        .unwrap();
    let appended = alice.append_thread(reply.token.as_str(), None).unwrap();

    assert!(!appended.is_duplicate());
    assert_eq!(appended.thread_id(), &reply.thread_id);
    reply.thread_id
}

#[test]
fn invitation_handshake_establishes_the_thread() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let alice_view = alice.decrypt_thread(&thread_id).unwrap();
    assert_eq!(alice_view.len(), 2);
    assert_eq!(alice_view[0].message, "Invite from Alice.\nNote: hi");
    assert_eq!(&alice_view[0].from, alice.thumbprint());
    assert_eq!(alice_view[1].message, "hello");
    assert_eq!(&alice_view[1].from, bob.thumbprint());

    let bob_view = bob.decrypt_thread(&thread_id).unwrap();
    assert_eq!(bob_view.len(), 2);
    assert_eq!(bob_view[0].message, "Invite from Alice.\nNote: hi");
    assert_eq!(bob_view[1].message, "hello");

    assert_eq!(alice.threads().unwrap(), vec![thread_id.clone()]);
    assert_eq!(bob.threads().unwrap(), vec![thread_id]);
}

#[test]
fn conversation_flows_both_ways() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let from_alice = alice.reply_to_thread(&thread_id, "hi Bob", &ReplyOptions::default()).unwrap();
    let appended = bob.append_thread(from_alice.token.as_str(), Some(&thread_id)).unwrap();
    assert!(!appended.is_duplicate());

    let from_bob = bob.reply_to_thread(&thread_id, "hi Alice", &ReplyOptions::default()).unwrap();
    alice.append_thread(from_bob.token.as_str(), Some(&thread_id)).unwrap();

    let alice_view = alice.decrypt_thread(&thread_id).unwrap();
    let texts: Vec<&str> = alice_view.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, ["Invite from Alice.\nNote: hi", "hello", "hi Bob", "hi Alice"]);

    let bob_view = bob.decrypt_thread(&thread_id).unwrap();
    let texts: Vec<&str> = bob_view.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, ["Invite from Alice.\nNote: hi", "hello", "hi Bob", "hi Alice"]);
}

#[test]
fn acknowledged_messages_sort_before_their_acknowledgment() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    // Bob's "two" embeds a minAck covering Alice's "one"; whatever the
    // iat/hex tie-break says, "one" must render first.
    let one = alice.reply_to_thread(&thread_id, "one", &ReplyOptions::default()).unwrap();
    bob.append_thread(one.token.as_str(), Some(&thread_id)).unwrap();
    let two = bob.reply_to_thread(&thread_id, "two", &ReplyOptions::default()).unwrap();
    alice.append_thread(two.token.as_str(), Some(&thread_id)).unwrap();

    let view = alice.decrypt_thread(&thread_id).unwrap();
    let texts: Vec<&str> = view.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, ["Invite from Alice.\nNote: hi", "hello", "one", "two"]);
}

#[test]
fn redelivery_is_idempotent() {
    let (mut alice, mut bob) = pair();
    let invitation = alice.create_invitation("Alice", None).unwrap();
    let reply =
        bob.reply_to_invitation(invitation.as_str(), "hello", &ReplyOptions::default()).unwrap();

    alice.append_thread(reply.token.as_str(), None).unwrap();
    let again = alice.append_thread(reply.token.as_str(), None).unwrap();
    assert!(again.is_duplicate());

    let from_bob =
        bob.reply_to_thread(&reply.thread_id, "again?", &ReplyOptions::default()).unwrap();
    alice.append_thread(from_bob.token.as_str(), Some(&reply.thread_id)).unwrap();
    let duplicate =
        alice.append_thread(from_bob.token.as_str(), Some(&reply.thread_id)).unwrap();
    assert!(duplicate.is_duplicate());

    // Two real messages, no matter how often they were delivered.
    assert_eq!(alice.decrypt_thread(&reply.thread_id).unwrap().len(), 3);
}

#[test]
fn own_older_message_redelivery_is_a_noop() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let one = alice.reply_to_thread(&thread_id, "one", &ReplyOptions::default()).unwrap();
    alice.reply_to_thread(&thread_id, "two", &ReplyOptions::default()).unwrap();

    // A relay echo of "one" arrives after "two" already advanced the send
    // sequence; it is already in the log, so it must drop out quietly.
    let echoed = alice.append_thread(one.token.as_str(), Some(&thread_id)).unwrap();
    assert!(echoed.is_duplicate());

    let view = alice.decrypt_thread(&thread_id).unwrap();
    let texts: Vec<&str> = view.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, ["Invite from Alice.\nNote: hi", "hello", "one", "two"]);
}

#[test]
fn backfilled_peer_message_redelivery_is_a_noop() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let tokens: Vec<String> = (0..4)
        .map(|i| {
            bob.reply_to_thread(&thread_id, &format!("m{i}"), &ReplyOptions::default())
                .unwrap()
                .token
                .as_str()
                .to_string()
        })
        .collect();

    // Out-of-order delivery leaves the contiguous bound one short of the
    // highest received id.
    alice.append_thread(&tokens[0], Some(&thread_id)).unwrap();
    alice.append_thread(&tokens[3], Some(&thread_id)).unwrap();
    alice.append_thread(&tokens[1], Some(&thread_id)).unwrap();
    alice.append_thread(&tokens[2], Some(&thread_id)).unwrap();
    alice.drain_events();

    // Re-delivering the highest message must not re-append or re-announce
    // it, even though its id sits right above the contiguous bound again.
    let again = alice.append_thread(&tokens[3], Some(&thread_id)).unwrap();
    assert!(again.is_duplicate());
    let again = alice.append_thread(&tokens[2], Some(&thread_id)).unwrap();
    assert!(again.is_duplicate());
    assert!(alice.drain_events().is_empty());

    assert_eq!(alice.decrypt_thread(&thread_id).unwrap().len(), 6);
}

#[test]
fn gap_beyond_the_window_is_fatal_until_backfilled() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let tokens: Vec<String> = (0..6)
        .map(|i| {
            bob.reply_to_thread(&thread_id, &format!("m{i}"), &ReplyOptions::default())
                .unwrap()
                .token
                .as_str()
                .to_string()
        })
        .collect();

    // Skipping straight to the sixth puts the gap at the window size.
    let err = alice.append_thread(&tokens[5], Some(&thread_id)).unwrap_err();
    let ClientError::Ordering(OrderingError::GapExceedsWindow { count, .. }) = err else {
        panic!("expected a window overflow, got {err:?}");
    };
    assert_eq!(count, 5);

    // Within the window the gap is tolerated and tracked.
    assert!(!alice.append_thread(&tokens[2], Some(&thread_id)).unwrap().is_duplicate());
    assert!(!alice.append_thread(&tokens[0], Some(&thread_id)).unwrap().is_duplicate());
    assert!(!alice.append_thread(&tokens[1], Some(&thread_id)).unwrap().is_duplicate());
    assert!(!alice.append_thread(&tokens[3], Some(&thread_id)).unwrap().is_duplicate());

    let view = alice.decrypt_thread(&thread_id).unwrap();
    let texts: Vec<&str> = view.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts[2..], ["m0", "m1", "m2", "m3"]);
}

#[test]
fn invitations_cannot_be_appended() {
    let (mut alice, _) = pair();
    let invitation = alice.create_invitation("Alice", None).unwrap();

    let err = alice.append_thread(invitation.as_str(), None).unwrap_err();
    assert_eq!(err, ClientError::UnexpectedToken(Subject::Invitation));
}

#[test]
fn reply_to_unknown_invitation_is_rejected() {
    let (mut alice, mut bob) = pair();
    let mut charlie = Client::generate(MemoryStorage::new(), "charlie-pw").unwrap();

    let invitation = alice.create_invitation("Alice", None).unwrap();
    let reply =
        bob.reply_to_invitation(invitation.as_str(), "hello", &ReplyOptions::default()).unwrap();

    // Charlie never issued that invitation, so the handshake means nothing
    // to him.
    let err = charlie.append_thread(reply.token.as_str(), None).unwrap_err();
    assert!(matches!(err, ClientError::InvitationNotFound(_)));
}

#[test]
fn tokens_from_strangers_fail_verification() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let mallory = SigningKeyPair::generate();
    let header = TokenHeader::new(Subject::Reply)
        .with_jwk(mallory.public_jwk().unwrap())
        .with_iv("AAAAAAAAAAAAAAAA".to_string());
    let forged =
        SignedToken::sign(header, &Body::Text("junk".to_string()), &mallory).unwrap();

    let err = alice.append_thread(forged.as_str(), Some(&thread_id)).unwrap_err();
    assert_eq!(err, ClientError::InvalidSignature);
}

#[test]
fn relay_announcements_propagate_in_one_round_trip() {
    let (mut alice, mut bob) = pair();
    let invitation = alice.create_invitation("Alice", None).unwrap();

    let opts = ReplyOptions {
        set_my_relay: Some("https://relay.example/bob".to_string()),
        ..ReplyOptions::default()
    };
    let reply = bob.reply_to_invitation(invitation.as_str(), "hello", &opts).unwrap();
    alice.append_thread(reply.token.as_str(), None).unwrap();

    // Alice now knows where Bob wants his messages pushed.
    let outgoing =
        alice.reply_to_thread(&reply.thread_id, "ack", &ReplyOptions::default()).unwrap();
    assert_eq!(outgoing.peer_relay.as_deref(), Some("https://relay.example/bob"));

    let events = alice.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        ClientEvent::RelayLearned { url, .. } if url.as_str() == "https://relay.example/bob"
    )));
}

#[test]
fn non_http_relay_announcements_are_ignored() {
    let (mut alice, mut bob) = pair();
    let invitation = alice.create_invitation("Alice", None).unwrap();

    let opts = ReplyOptions {
        set_my_relay: Some("file:///etc/passwd".to_string()),
        ..ReplyOptions::default()
    };
    let reply = bob.reply_to_invitation(invitation.as_str(), "hello", &opts).unwrap();
    alice.append_thread(reply.token.as_str(), None).unwrap();

    let outgoing =
        alice.reply_to_thread(&reply.thread_id, "ack", &ReplyOptions::default()).unwrap();
    assert_eq!(outgoing.peer_relay, None);
}

#[test]
fn handshake_emits_thread_and_message_events() {
    let (mut alice, mut bob) = pair();
    let thread_id = handshake(&mut alice, &mut bob);

    let events = alice.drain_events();
    assert!(events.iter().any(|event| matches!(event, ClientEvent::InvitationCreated { .. })));
    assert!(events.iter().any(
        |event| matches!(event, ClientEvent::ThreadCreated { thread_id: id } if *id == thread_id)
    ));
    assert!(events.iter().any(|event| matches!(event, ClientEvent::MessageAppended { .. })));

    // Draining empties the queue.
    assert!(alice.drain_events().is_empty());
}

#[test]
fn reloaded_identity_reads_the_same_thread() {
    let storage = MemoryStorage::new();
    let mut alice = Client::generate(storage.clone(), "alice-pw").unwrap();
    let mut bob = Client::generate(MemoryStorage::new(), "bob-pw").unwrap();
    let thread_id = handshake(&mut alice, &mut bob);

    let thumbprint = alice.thumbprint().clone();
    drop(alice);

    let reopened = Client::load(storage, &thumbprint, "alice-pw").unwrap();
    let view = reopened.decrypt_thread(&thread_id).unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(view[1].message, "hello");
}
