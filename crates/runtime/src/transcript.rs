//! Observers of the conversation transcript.

use crate::model::Message;
use crate::session::Outcome;
use storage::{Event, EventKind, EventStore, SessionId};

/// Receives every message a session appends, plus lifecycle markers.
///
/// Failures are reported back to the session, which logs them and carries
/// on. A sink never aborts an exchange.
pub trait TranscriptSink: Send {
    fn session_start(&mut self, _session: SessionId) -> storage::Result<()> {
        Ok(())
    }

    fn message(&mut self, session: SessionId, message: &Message) -> storage::Result<()>;

    fn exchange_end(
        &mut self,
        _session: SessionId,
        _outcome: &Outcome,
        _turns: usize,
    ) -> storage::Result<()> {
        Ok(())
    }

    fn session_end(&mut self, _session: SessionId) -> storage::Result<()> {
        Ok(())
    }
}

impl TranscriptSink for EventStore {
    fn session_start(&mut self, session: SessionId) -> storage::Result<()> {
        self.append(&Event::new(session, EventKind::SessionStart))
    }

    fn message(&mut self, session: SessionId, message: &Message) -> storage::Result<()> {
        let tool_calls = message
            .tool_calls
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        self.append(&Event::message(
            session,
            message.role.into(),
            message.content.clone(),
            tool_calls,
        ))
    }

    fn exchange_end(
        &mut self,
        session: SessionId,
        outcome: &Outcome,
        turns: usize,
    ) -> storage::Result<()> {
        self.append(&Event::new(
            session,
            EventKind::ExchangeEnd {
                outcome: outcome.label().to_string(),
                turns,
            },
        ))
    }

    fn session_end(&mut self, session: SessionId) -> storage::Result<()> {
        self.append(&Event::new(session, EventKind::SessionEnd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCallRequest;
    use serde_json::{Map, json};
    use storage::Role;

    #[test]
    fn event_store_records_tool_calls() {
        let mut store = EventStore::in_memory().unwrap();
        let id = SessionId::new();
        let mut args = Map::new();
        args.insert("expression".into(), json!("2+2"));

        store
            .message(id, &Message::tool_calls(vec![ToolCallRequest::new("calculate", args)]))
            .unwrap();
        store
            .exchange_end(id, &Outcome::Final("4".into()), 2)
            .unwrap();

        let events = store.load_session(id).unwrap();
        assert_eq!(
            events[0].kind,
            EventKind::Message {
                role: Role::Assistant,
                content: None,
                tool_calls: Some(json!([{"name": "calculate", "arguments": {"expression": "2+2"}}])),
            }
        );
        assert_eq!(
            events[1].kind,
            EventKind::ExchangeEnd {
                outcome: "final".into(),
                turns: 2
            }
        );
    }
}
