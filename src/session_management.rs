//! Session management core module.
//!
//! A [`session::Session`] is the in-memory record of one MTA connection; it owns the
//! ordered [`message::Message`]s (mail transactions) created during that connection.

use serde::{Deserialize, Serialize};

/// Submodule for mail transactions carried by a session.
pub mod message;
/// Submodule for the session data structure and its lifecycle.
pub mod session;

pub use message::{Message, MessageHandle};
pub use session::Session;

/// Lifecycle state of a session.
///
/// Variants:
/// - `Open`: created, attributes still being negotiated, no disconnect time.
/// - `Closed`: disconnect time recorded.
/// - `Persisted`: final record handed to the persistence pipeline. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Closed,
    Persisted,
}
