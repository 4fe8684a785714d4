//! Storage subsystem
//!
//! This module provides the relational side of session persistence.
//!
//! Components:
//! - `storage_trait`: the `SessionStore` trait defining the two upserts the pipeline needs.
//! - `types`: row types shared by storage backends.
//! - `database_storage`: SQLite implementation using sqlx.
//! - `client_registry`: in-process cache of reporting-node ids in front of the store.

pub mod client_registry;
pub mod database_storage;
pub mod storage_trait;
pub mod types;

pub use client_registry::{ClientRegistry, ResolvedClient};
pub use database_storage::DatabaseStorage;
pub use storage_trait::SessionStore;
pub use types::{ClientRecord, StoredSession};
