//! Turns store snapshots into incremental terminal output.

use parley_core::ChatSnapshot;
use parley_core::types::{MessageStatus, Role};

#[derive(Debug, Default)]
pub struct Renderer {
    reply_id: Option<String>,
    printed: usize,
    last_error: Option<String>,
}

impl Renderer {
    /// Text to print for the change from the previous snapshot to `snap`.
    pub fn render(&mut self, snap: &ChatSnapshot) -> String {
        let mut out = String::new();

        let reply = snap
            .session
            .as_ref()
            .and_then(|s| s.messages.last())
            .filter(|m| m.role == Role::Assistant);
        if let Some(reply) = reply {
            if self.reply_id.as_deref() != Some(reply.id.as_str()) {
                self.reply_id = Some(reply.id.clone());
                self.printed = 0;
                out.push_str("assistant> ");
            }
            if let Some(fresh) = reply.content.get(self.printed..) {
                out.push_str(fresh);
                self.printed = reply.content.len();
            }
            if reply.status == MessageStatus::Incomplete && self.printed > 0 {
                out.push_str(" [incomplete]");
                self.printed = usize::MAX;
            }
        }

        match snap.state.error() {
            Some(err) if self.last_error.as_deref() != Some(err) => {
                self.last_error = Some(err.to_owned());
                out.push_str(&format!("\n[error] {err}"));
            }
            Some(_) => {}
            None => self.last_error = None,
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use parley_core::TurnState;
    use parley_core::types::{ChatSession, Message};

    fn snapshot(reply: &Message, state: TurnState) -> ChatSnapshot {
        let mut session = ChatSession::new();
        session.push(Message::user("hi", vec![]));
        session.push(reply.clone());
        ChatSnapshot {
            session: Some(session),
            state,
            generation: 0,
        }
    }

    #[test]
    fn prints_only_new_text() {
        let mut r = Renderer::default();
        let mut reply = Message::assistant_placeholder();
        assert_eq!(r.render(&snapshot(&reply, TurnState::Streaming)), "assistant> ");
        reply.content.push_str("Hel");
        assert_eq!(r.render(&snapshot(&reply, TurnState::Streaming)), "Hel");
        reply.content.push_str("lo");
        assert_eq!(r.render(&snapshot(&reply, TurnState::Streaming)), "lo");
        assert_eq!(r.render(&snapshot(&reply, TurnState::Idle)), "");
    }

    #[test]
    fn error_is_printed_once() {
        let mut r = Renderer::default();
        let reply = Message::assistant_placeholder();
        let failed = TurnState::Error("Connection lost while streaming".into());
        let first = r.render(&snapshot(&reply, failed.clone()));
        assert!(first.ends_with("[error] Connection lost while streaming"));
        assert_eq!(r.render(&snapshot(&reply, failed)), "");
    }

    #[test]
    fn incomplete_reply_is_flagged_once() {
        let mut r = Renderer::default();
        let mut reply = Message::assistant_placeholder();
        reply.content.push_str("par");
        r.render(&snapshot(&reply, TurnState::Streaming));
        reply.status = MessageStatus::Incomplete;
        assert_eq!(r.render(&snapshot(&reply, TurnState::Idle)), " [incomplete]");
        assert_eq!(r.render(&snapshot(&reply, TurnState::Idle)), "");
    }
}
