//! Prompt sequence handed to a model provider.

use serde::{Deserialize, Serialize};

use crate::chat::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        }
    }
}

/// A single `{role, content}` turn.
///
/// Deserializing ignores unknown fields, so a full chat message (with ids,
/// timestamps and attachments) reads as a prompt message directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chat::Message;

    #[test]
    fn chat_message_reads_as_prompt_message() {
        let msg = Message::user("hello", vec![]);
        let json = serde_json::to_string(&msg).unwrap();
        let prompt: PromptMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(prompt, PromptMessage::user("hello"));
    }
}
