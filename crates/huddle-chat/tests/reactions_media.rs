mod common;

use common::Harness;
use huddle_chat::{ChatError, NewAttachment, Target};
use huddle_types::events::GatewayEvent;
use huddle_types::models::MediaType;

fn attachment(name: &str, mime: &str) -> NewAttachment {
    NewAttachment {
        url: format!("/uploads/chat/{}", name),
        file_name: name.to_string(),
        file_size: 1024,
        mime_type: mime.to_string(),
    }
}

#[test]
fn reaction_replaces_instead_of_accumulating() {
    let h = Harness::new();
    let (room_id, a, _) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "ship it", false).unwrap();
    h.events.take();

    let first = h.chat.reactions.add_or_replace(message.id, a, "👍").unwrap();
    let second = h.chat.reactions.add_or_replace(message.id, a, "❤️").unwrap();
    assert_eq!(first.id, second.id);

    let rows = h.db.reactions_for_messages(&[message.id.to_string()]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].emoji, "❤️");

    let emojis: Vec<_> = h
        .events
        .take()
        .into_iter()
        .filter_map(|(target, event)| match (target, event) {
            (Target::Room { room_id: r, .. }, GatewayEvent::ReactionAdded { emoji, .. }) if r == room_id => {
                Some(emoji)
            }
            _ => None,
        })
        .collect();
    assert_eq!(emojis, ["👍", "❤️"]);
}

#[test]
fn remove_publishes_only_when_something_was_removed() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "hi", false).unwrap();
    h.chat.reactions.add_or_replace(message.id, b, "🎉").unwrap();
    h.events.take();

    assert!(h.chat.reactions.remove(message.id, b).unwrap());
    assert!(matches!(
        h.events.take().as_slice(),
        [(_, GatewayEvent::ReactionRemoved { user_id, .. })] if *user_id == b
    ));

    assert!(!h.chat.reactions.remove(message.id, b).unwrap());
    assert!(h.events.take().is_empty());
}

#[test]
fn reactions_are_validated() {
    let h = Harness::new();
    let (room_id, a, _) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "hi", false).unwrap();
    let outsider = h.user("eve");

    let err = h.chat.reactions.add_or_replace(message.id, a, "  ").unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    let err = h.chat.reactions.add_or_replace(message.id, outsider, "👀").unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));

    h.chat.messages.delete_message(room_id, message.id, a).unwrap();
    let err = h.chat.reactions.add_or_replace(message.id, a, "👍").unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
}

#[test]
fn media_type_is_classified_once_at_attach() {
    let h = Harness::new();
    let (room_id, a, b) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "", true).unwrap();
    h.events.take();

    let cases = [
        ("cat.png", "image/png", MediaType::Image),
        ("clip.mp4", "video/mp4", MediaType::Video),
        ("note.ogg", "Audio/ogg", MediaType::Audio),
        ("report.pdf", "application/pdf", MediaType::File),
    ];
    for (name, mime, expected) in cases {
        let media = h.chat.media.attach(room_id, message.id, b, attachment(name, mime)).unwrap();
        assert_eq!(media.media_type, expected);
        assert_eq!(media.message_id, message.id);
    }

    let uploads = h
        .events
        .take()
        .into_iter()
        .filter(|(_, event)| matches!(event, GatewayEvent::MediaUploaded(_)))
        .count();
    assert_eq!(uploads, 4);

    let page = h.chat.messages.list_messages(room_id, a, None, None).unwrap();
    assert_eq!(page[0].media.len(), 4);
}

#[test]
fn attach_requires_membership_and_matching_room() {
    let h = Harness::new();
    let (room_id, a, _) = h.direct_pair();
    let c = h.user("carol");
    let (other, _) = h.chat.rooms.get_or_create_direct_room(a, c).unwrap();
    let message = h.chat.messages.send_message(room_id, a, "see attached", false).unwrap();

    let err = h.chat.media.check_upload(room_id, message.id, c).unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));

    let err = h.chat.media.check_upload(other.id, message.id, a).unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    h.chat.media.check_upload(room_id, message.id, a).unwrap();

    h.chat.messages.delete_message(room_id, message.id, a).unwrap();
    let err = h
        .chat
        .media
        .attach(room_id, message.id, a, attachment("late.txt", "text/plain"))
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
}

#[test]
fn tombstone_drops_media() {
    let h = Harness::new();
    let (room_id, a, _) = h.direct_pair();
    let message = h.chat.messages.send_message(room_id, a, "pic", false).unwrap();
    h.chat.media.attach(room_id, message.id, a, attachment("a.jpg", "image/jpeg")).unwrap();

    h.chat.messages.delete_message(room_id, message.id, a).unwrap();
    assert!(h.db.media_for_messages(&[message.id.to_string()]).unwrap().is_empty());
}
