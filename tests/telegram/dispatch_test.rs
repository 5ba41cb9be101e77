//! Tests for how updates are spread across dispatcher workers.

use teloxide::types::Update;

use doppel::telegram::update_worker_key;

fn update_from(chat_id: i64, update_id: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1_700_000_000,
            "chat": { "id": chat_id, "type": "private", "first_name": "ann" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "ann" },
            "text": text
        }
    }))
    .expect("update should deserialize")
}

#[test]
fn updates_from_one_chat_are_not_serialized() {
    // A slow /persona must not hold back the next message from the same chat.
    let persona = update_from(5, 1, "/persona");
    let chatter = update_from(5, 2, "hello");

    assert!(update_worker_key(&persona).is_none());
    assert!(update_worker_key(&chatter).is_none());
}
