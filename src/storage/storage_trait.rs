//! Storage Trait
//!
//! This module defines the `SessionStore` trait, the relational write interface the
//! persistence pipeline depends on.
//!
//! Implementors are responsible for:
//! - Upserting session rows keyed by session id
//! - Upserting reporting-node (client) rows keyed by hostname and daemon name
//!
//! All methods return a `Result` to handle potential storage errors.

use async_trait::async_trait;

use crate::error_handling::types::PersistenceError;
use crate::persistence::record::SessionRecord;

/// Relational write operations used by the persistence consumer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a session row, or, when the id already exists, updates only its
    /// disconnect time. An unset disconnect time never clears a stored one.
    ///
    /// - `record` - The decoded session record; `client_id` must already be resolved.
    async fn upsert_session(&self, record: &SessionRecord) -> Result<(), PersistenceError>;

    /// Inserts a client row or finds the existing one, returning its id. Never
    /// reassigns the id of an existing row.
    async fn upsert_client(
        &self,
        hostname: &str,
        daemon_name: &str,
    ) -> Result<u64, PersistenceError>;
}
