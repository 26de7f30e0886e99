//! Ordered message history sent to the generative service.
//!
//! A [`Conversation`] is append-only: messages are never edited or removed, and
//! the full ordered sequence is the literal context of every request.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One exchanged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Whether source units share one history or each start from the seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    /// One history accumulates across every unit of a run.
    #[default]
    Shared,
    /// Every unit starts from a fresh conversation holding only the seed messages.
    PerUnit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
    seed_len: usize,
}

impl Conversation {
    /// Start a conversation from instructional seed messages.
    pub fn new(seed: Vec<Message>) -> Self {
        let seed_len = seed.len();
        Self {
            messages: seed,
            seed_len,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The full ordered history, seed first.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn seed_len(&self) -> usize {
        self.seed_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order_after_seed() {
        let mut conversation = Conversation::new(vec![Message::system("seed")]);
        conversation.append(Message::user("prompt"));
        conversation.append(Message::system("response"));

        let contents: Vec<&str> = conversation
            .snapshot()
            .iter()
            .map(|message| message.content.as_str())
            .collect();
        assert_eq!(contents, vec!["seed", "prompt", "response"]);
        assert_eq!(conversation.seed_len(), 1);
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::user("hi")).expect("serialize");
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn history_scope_defaults_to_shared() {
        assert_eq!(HistoryScope::default(), HistoryScope::Shared);
    }
}
