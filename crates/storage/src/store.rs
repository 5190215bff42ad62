//! SQLite event store implementation.

use crate::{Error, Event, EventKind, Result, SessionId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use std::path::Path;

/// SQLite-backed event store.
pub struct EventStore {
    conn: Connection,
}

/// Summary of one recorded session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: usize,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON events(session_id, timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Append an event to the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, session_id, timestamp, kind, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.session_id.to_string(),
                format_timestamp(&event.timestamp),
                event.kind.name(),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(())
    }

    /// Load all events for a session, in the order they were appended.
    pub fn load_session(&self, session_id: SessionId) -> Result<Vec<Event>> {
        self.load_events(session_id, None)
    }

    /// Load events for a session, optionally only those of one kind.
    pub fn load_events(&self, session_id: SessionId, kind: Option<&str>) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, timestamp, data FROM events
             WHERE session_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY timestamp, rowid",
        )?;

        let rows = stmt.query_map(params![session_id.to_string(), kind], read_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(decode_event(row?)?);
        }
        Ok(events)
    }

    /// List recorded sessions, most recent first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id,
                    MIN(timestamp),
                    MAX(CASE WHEN kind = 'session_end' THEN timestamp END),
                    SUM(CASE WHEN kind = 'message' THEN 1 ELSE 0 END)
             FROM events
             GROUP BY session_id
             ORDER BY MIN(timestamp) DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let started_at: String = row.get(1)?;
            let ended_at: Option<String> = row.get(2)?;
            let message_count: i64 = row.get(3)?;
            Ok((id, started_at, ended_at, message_count))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, ended_at, message_count) = row?;
            sessions.push(SessionSummary {
                id: id.parse().map_err(|e: uuid::Error| corrupt(&id, e))?,
                started_at: parse_timestamp(&id, &started_at)?,
                ended_at: ended_at
                    .map(|ts| parse_timestamp(&id, &ts))
                    .transpose()?,
                message_count: usize::try_from(message_count).unwrap_or_default(),
            });
        }
        Ok(sessions)
    }
}

type RawEvent = (String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_event((id, session_id, timestamp, data): RawEvent) -> Result<Event> {
    Ok(Event {
        id: id.parse().map_err(|e: uuid::Error| corrupt(&id, e))?,
        session_id: session_id.parse().map_err(|e: uuid::Error| corrupt(&id, e))?,
        timestamp: parse_timestamp(&id, &timestamp)?,
        kind: serde_json::from_str::<EventKind>(&data)?,
    })
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    // Fixed-width so that text ordering matches time ordering.
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, raw: &str) -> Result<DateTime<Utc>> {
    raw.parse().map_err(|e: chrono::ParseError| corrupt(id, e))
}

fn corrupt(id: &str, reason: impl std::fmt::Display) -> Error {
    Error::Corrupt {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn store_with_session() -> (EventStore, SessionId) {
        let store = EventStore::in_memory().unwrap();
        let id = SessionId::new();
        store.append(&Event::new(id, EventKind::SessionStart)).unwrap();
        store
            .append(&Event::message(id, Role::User, Some("What is 2+2?".into()), None))
            .unwrap();
        store
            .append(&Event::message(
                id,
                Role::Assistant,
                None,
                Some(serde_json::json!([{"name": "calculate", "arguments": {"expression": "2+2"}}])),
            ))
            .unwrap();
        store
            .append(&Event::message(id, Role::Tool, Some("4".into()), None))
            .unwrap();
        (store, id)
    }

    #[test]
    fn load_session_preserves_append_order() {
        let (store, id) = store_with_session();
        let events = store.load_session(id).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].kind, EventKind::SessionStart);
        assert!(matches!(
            &events[3].kind,
            EventKind::Message { role: Role::Tool, content: Some(c), .. } if c == "4"
        ));
    }

    #[test]
    fn load_events_filters_by_kind() {
        let (store, id) = store_with_session();
        let messages = store.load_events(id, Some("message")).unwrap();
        assert_eq!(messages.len(), 3);
        let starts = store.load_events(id, Some("session_start")).unwrap();
        assert_eq!(starts.len(), 1);
    }

    #[test]
    fn list_sessions_counts_messages_and_end() {
        let (store, id) = store_with_session();
        let open = store.list_sessions().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, id);
        assert_eq!(open[0].message_count, 3);
        assert!(open[0].ended_at.is_none());

        store.append(&Event::new(id, EventKind::SessionEnd)).unwrap();
        let ended = store.list_sessions().unwrap();
        assert!(ended[0].ended_at.is_some());
    }

    #[test]
    fn empty_store_lists_nothing() {
        let store = EventStore::in_memory().unwrap();
        assert!(store.list_sessions().unwrap().is_empty());
        assert!(store.load_session(SessionId::new()).unwrap().is_empty());
    }
}
