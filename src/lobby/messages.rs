//! Outbound tag builders.
//!
//! Chat builders return one document per wire segment; each segment is sent
//! as its own frame.

use super::split_message;
use crate::wml::{self, Data, Tag};

/// Sender name used for messages originating from the server itself.
pub const SERVER_SENDER: &str = "server";

/// Child index at which lobby join diffs insert the new user.
pub const JOIN_DIFF_INDEX: i64 = 1;

/// Split text into segments whose escaped form fits on the wire.
fn segments(text: &str) -> Vec<String> {
    split_message(&wml::escape(text))
        .iter()
        .map(|s| wml::unescape(s))
        .collect()
}

/// Room chat message, one document per segment.
pub fn message(sender: &str, room: &str, text: &str) -> Vec<Data> {
    segments(text)
        .into_iter()
        .map(|segment| {
            Tag::with_data(
                "message",
                Data::new()
                    .with_attr("message", segment)
                    .with_attr("room", room)
                    .with_attr("sender", sender),
            )
            .into_document()
        })
        .collect()
}

/// Chat message attributed to the server.
pub fn server_message(text: &str) -> Vec<Data> {
    segments(text)
        .into_iter()
        .map(|segment| {
            Tag::with_data(
                "message",
                Data::new()
                    .with_attr("message", segment)
                    .with_attr("sender", SERVER_SENDER),
            )
            .into_document()
        })
        .collect()
}

/// Private message, one document per segment.
pub fn whisper(sender: &str, receiver: &str, text: &str) -> Vec<Data> {
    segments(text)
        .into_iter()
        .map(|segment| {
            Tag::with_data(
                "whisper",
                Data::new()
                    .with_attr("sender", sender)
                    .with_attr("receiver", receiver)
                    .with_attr("message", segment),
            )
            .into_document()
        })
        .collect()
}

/// Request for the client version.
pub fn version_request() -> Data {
    Tag::new("version").into_document()
}

/// Request for the client login.
pub fn must_login() -> Data {
    Tag::new("mustlogin").into_document()
}

/// Acknowledges that the client has entered the lobby.
pub fn join_lobby() -> Data {
    Tag::new("join_lobby").into_document()
}

/// Tells the client to leave whatever game it thinks it is in.
pub fn leave_game() -> Data {
    Tag::new("leave_game").into_document()
}

/// Presence record for a lobby user.
pub fn presence(name: &str) -> Data {
    Data::new()
        .with_attr("available", true)
        .with_attr("game_id", 0)
        .with_attr("location", "")
        .with_attr("name", name)
        .with_attr("registered", false)
        .with_attr("status", "lobby")
}

/// Full lobby snapshot: an empty game list and one `[user]` per name.
pub fn lobby_snapshot(usernames: &[String]) -> Data {
    usernames.iter().fold(
        Data::new().with_child(Tag::new("gamelist")),
        |doc, name| doc.with_child(Tag::with_data("user", presence(name))),
    )
}

/// Incremental roster update announcing one new lobby user.
pub fn lobby_join_diff(name: &str) -> Data {
    let insert = Data::new()
        .with_attr("index", JOIN_DIFF_INDEX)
        .with_child(Tag::with_data("user", presence(name)));
    Tag::with_data(
        "gamelist_diff",
        Data::new().with_child(Tag::with_data("insert_child", insert)),
    )
    .into_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::MAX_SEGMENT_CHARS;
    use crate::wml::Value;

    #[test]
    fn test_message_shape() {
        let docs = message("alice", "lobby", "hello");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].read_string("message.sender").unwrap(), "alice");
        assert_eq!(docs[0].read_string("message.room").unwrap(), "lobby");
        assert_eq!(docs[0].read_string("message.message").unwrap(), "hello");
    }

    #[test]
    fn test_server_message_shape() {
        let docs = server_message("Welcome!");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].read_string("message.sender").unwrap(), "server");
        assert!(docs[0].read_string("message.room").is_err());
    }

    #[test]
    fn test_whisper_shape() {
        let docs = whisper("alice", "bob", "psst");
        assert_eq!(docs[0].read_string("whisper.sender").unwrap(), "alice");
        assert_eq!(docs[0].read_string("whisper.receiver").unwrap(), "bob");
        assert_eq!(docs[0].read_string("whisper.message").unwrap(), "psst");
    }

    #[test]
    fn test_long_message_is_segmented() {
        let text = "x".repeat(600);
        let docs = message("alice", "lobby", &text);
        assert_eq!(docs.len(), 3);

        let rebuilt: String = docs
            .iter()
            .map(|d| d.read_string("message.message").unwrap())
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_segments_fit_on_wire_when_escaped() {
        let text = "\"".repeat(300);
        let docs = whisper("a", "b", &text);
        for doc in &docs {
            let segment = doc.read_string("whisper.message").unwrap();
            assert!(wml::escape(&segment).chars().count() <= MAX_SEGMENT_CHARS);
        }
        let rebuilt: String = docs
            .iter()
            .map(|d| d.read_string("whisper.message").unwrap())
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_empty_requests() {
        assert_eq!(version_request().to_text(), "[version]\n[/version]\n");
        assert_eq!(must_login().to_text(), "[mustlogin]\n[/mustlogin]\n");
        assert_eq!(join_lobby().to_text(), "[join_lobby]\n[/join_lobby]\n");
        assert_eq!(leave_game().to_text(), "[leave_game]\n[/leave_game]\n");
    }

    #[test]
    fn test_presence_record() {
        let record = presence("alice");
        assert_eq!(record.attr("available"), Some(&Value::Bool(true)));
        assert_eq!(record.attr("game_id"), Some(&Value::Int(0)));
        assert_eq!(record.attr("location"), Some(&Value::from("")));
        assert_eq!(record.attr("name"), Some(&Value::from("alice")));
        assert_eq!(record.attr("registered"), Some(&Value::Bool(false)));
        assert_eq!(record.attr("status"), Some(&Value::from("lobby")));
    }

    #[test]
    fn test_lobby_snapshot() {
        let names = vec!["alice".to_string(), "bob".to_string()];
        let doc = lobby_snapshot(&names);
        let children = doc.children();

        assert_eq!(children.len(), 3);
        assert_eq!(children[0].name, "gamelist");
        assert!(children[0].data.is_empty());
        assert_eq!(children[1].data.read_string("name").unwrap(), "alice");
        assert_eq!(children[2].data.read_string("name").unwrap(), "bob");
    }

    #[test]
    fn test_lobby_join_diff() {
        let doc = lobby_join_diff("carol");
        assert_eq!(
            doc.read_string("gamelist_diff.insert_child.index").unwrap(),
            "1"
        );
        assert_eq!(
            doc.read_string("gamelist_diff.insert_child.user.name")
                .unwrap(),
            "carol"
        );
        assert_eq!(
            doc.read_string("gamelist_diff.insert_child.user.status")
                .unwrap(),
            "lobby"
        );
    }
}
