mod common;

use common::Harness;
use huddle_chat::{ChatError, Target};
use huddle_types::api::MarkReadOutcome;
use huddle_types::events::GatewayEvent;
use huddle_types::models::DeliveryStatus;

#[test]
fn hello_then_read_scenario() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();

    let message = h.chat.messages.send_message(room_id, a, "hello", false).unwrap();
    assert_eq!(h.unread(room_id, b), 1);
    h.events.take();

    let outcome = h.chat.receipts.mark_as_read(message.id, b).unwrap();
    assert_eq!(outcome, MarkReadOutcome::Recorded);
    assert_eq!(h.unread(room_id, b), 0);

    let events = h.events.take();
    assert!(matches!(
        events.as_slice(),
        [(Target::Room { room_id: r, except: None }, GatewayEvent::MessageRead { message_id, user_id })]
            if *r == room_id && *message_id == message.id && *user_id == b
    ));
}

#[test]
fn second_read_is_a_no_op() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();
    let first = h.chat.messages.send_message(room_id, a, "one", false).unwrap();
    h.chat.messages.send_message(room_id, a, "two", false).unwrap();
    assert_eq!(h.unread(room_id, b), 2);

    h.chat.receipts.mark_as_read(first.id, b).unwrap();
    assert_eq!(h.unread(room_id, b), 1);
    h.events.take();

    let outcome = h.chat.receipts.mark_as_read(first.id, b).unwrap();
    assert_eq!(outcome, MarkReadOutcome::AlreadyRead);
    assert_eq!(h.unread(room_id, b), 1);
    assert!(h.events.take().is_empty());
    assert_eq!(h.db.receipts_for_messages(&[first.id.to_string()]).unwrap().len(), 1);
}

#[test]
fn sender_never_receipts_own_message() {
    let h = Harness::new();
    let (room_id, a, _) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "mine", false).unwrap();
    h.events.take();

    let outcome = h.chat.receipts.mark_as_read(message.id, a).unwrap();
    assert_eq!(outcome, MarkReadOutcome::OwnMessage);
    assert!(h.db.receipts_for_messages(&[message.id.to_string()]).unwrap().is_empty());
    assert!(h.events.take().is_empty());
}

#[test]
fn outsiders_cannot_mark_read() {
    let h = Harness::new();
    let (room_id, a, _) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "private", false).unwrap();
    let outsider = h.user("eve");

    let err = h.chat.receipts.mark_as_read(message.id, outsider).unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));

    let err = h.chat.receipts.mark_as_read(uuid::Uuid::new_v4(), a).unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[test]
fn counter_never_goes_negative() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "x", false).unwrap();

    // Counter drifted to zero while the receipt is still missing
    h.db.reset_unread(&room_id.to_string(), &b.to_string()).unwrap();
    h.chat.receipts.mark_as_read(message.id, b).unwrap();
    assert_eq!(h.unread(room_id, b), 0);
}

#[test]
fn conversation_read_covers_only_unread_messages() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();
    let m1 = h.chat.messages.send_message(room_id, a, "one", false).unwrap();
    let m2 = h.chat.messages.send_message(room_id, a, "two", false).unwrap();
    let m3 = h.chat.messages.send_message(room_id, a, "three", false).unwrap();
    h.chat.messages.send_message(room_id, b, "mine", false).unwrap();
    h.chat.receipts.mark_as_read(m1.id, b).unwrap();
    h.events.take();

    let count = h.chat.receipts.mark_conversation_read(room_id, b).unwrap();
    assert_eq!(count, 2);
    assert_eq!(h.unread(room_id, b), 0);

    let read: Vec<_> = h
        .events
        .take()
        .into_iter()
        .filter_map(|(_, event)| match event {
            GatewayEvent::MessageRead { message_id, user_id } if user_id == b => Some(message_id),
            _ => None,
        })
        .collect();
    assert_eq!(read, [m2.id, m3.id]);

    assert_eq!(h.chat.receipts.mark_conversation_read(room_id, b).unwrap(), 0);
    assert!(h.events.take().is_empty());
    assert_eq!(h.db.count_unread(&room_id.to_string(), &b.to_string()).unwrap(), 0);
}

#[test]
fn delivery_acks_drive_status() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "hi", false).unwrap();
    h.events.take();

    // The author's own ack means nothing
    assert!(!h.chat.receipts.acknowledge_delivery(room_id, message.id, a).unwrap());
    let status = |h: &Harness| h.chat.messages.list_messages(room_id, a, None, None).unwrap()[0].status;
    assert_eq!(status(&h), DeliveryStatus::Sent);

    assert!(h.chat.receipts.acknowledge_delivery(room_id, message.id, b).unwrap());
    assert!(!h.chat.receipts.acknowledge_delivery(room_id, message.id, b).unwrap());
    assert_eq!(status(&h), DeliveryStatus::Delivered);

    let events = h.events.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0].1, GatewayEvent::MessageDelivered { user_id, .. } if *user_id == b));

    h.chat.receipts.mark_as_read(message.id, b).unwrap();
    assert_eq!(status(&h), DeliveryStatus::Read);
}
