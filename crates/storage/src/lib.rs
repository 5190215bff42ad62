//! SQLite-backed transcript storage for Tackle sessions.
//!
//! Every message the agent loop appends to a conversation, along with
//! session lifecycle and exchange outcomes, can be written to an
//! [`EventStore`] and read back later for inspection.
//!
//! # Core Concepts
//!
//! ## EventStore
//!
//! The [`EventStore`] wraps a SQLite database. It appends events and answers
//! per-session queries.
//!
//! ## Event
//!
//! An [`Event`] has a unique ID, the [`SessionId`] it belongs to, a timestamp
//! and an [`EventKind`]:
//! - `SessionStart` / `SessionEnd` for the session lifecycle
//! - `Message` for user, assistant and tool messages, including the tool
//!   calls an assistant message carried
//! - `ExchangeEnd` for the outcome of one user exchange
//!
//! # Example
//!
//! ```no_run
//! use storage::{Event, EventKind, EventStore, Role, SessionId};
//!
//! let store = EventStore::open("tackle.db")?;
//!
//! let session_id = SessionId::new();
//! store.append(&Event::new(session_id, EventKind::SessionStart))?;
//! store.append(&Event::message(session_id, Role::User, Some("What is 2+2?".into()), None))?;
//! store.append(&Event::message(session_id, Role::Assistant, Some("4".into()), None))?;
//!
//! for event in store.load_session(session_id)? {
//!     println!("{}: {:?}", event.timestamp, event.kind);
//! }
//!
//! for summary in store.list_sessions()? {
//!     println!("{}: {} messages", summary.id, summary.message_count);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod event;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind, Role, SessionId};
pub use store::{EventStore, SessionSummary};
