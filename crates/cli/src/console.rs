//! Transcript sink that echoes tool traffic to the terminal.

use runtime::{Message, Outcome, Role, TranscriptSink};
use storage::{EventStore, SessionId};

/// Prints tool calls and results as they happen, then forwards every
/// message to the event store.
pub struct ConsoleSink {
    store: EventStore,
}

impl ConsoleSink {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }
}

impl TranscriptSink for ConsoleSink {
    fn session_start(&mut self, session: SessionId) -> storage::Result<()> {
        self.store.session_start(session)
    }

    fn message(&mut self, session: SessionId, message: &Message) -> storage::Result<()> {
        match message.role {
            Role::Assistant => {
                for call in message.calls() {
                    println!("```json\n{}\n```", serde_json::to_string_pretty(call)?);
                }
            }
            Role::Tool => println!("-> {}", message.text()),
            Role::User => {}
        }
        self.store.message(session, message)
    }

    fn exchange_end(
        &mut self,
        session: SessionId,
        outcome: &Outcome,
        turns: usize,
    ) -> storage::Result<()> {
        self.store.exchange_end(session, outcome, turns)
    }

    fn session_end(&mut self, session: SessionId) -> storage::Result<()> {
        self.store.session_end(session)
    }
}
