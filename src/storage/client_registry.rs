use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::error_handling::types::PersistenceError;
use crate::storage::storage_trait::SessionStore;
use crate::storage::types::ClientRecord;

/// Outcome of a client lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedClient {
    pub id: u64,
    /// `true` when the id came from a store upsert rather than the cache.
    pub queried: bool,
}

/// Maps a reporting node (MTA hostname, daemon name) to its durable id.
///
/// Ids are cached for the life of the process and never evicted. The lookup, the
/// store upsert on a miss and the cache append all happen under one lock, so
/// concurrent resolutions of the same pair issue a single insert.
pub struct ClientRegistry {
    store: Arc<dyn SessionStore>,
    clients: Mutex<Vec<ClientRecord>>,
}

impl ClientRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            clients: Mutex::new(Vec::new()),
        }
    }

    pub async fn resolve(
        &self,
        hostname: &str,
        daemon_name: &str,
    ) -> Result<u64, PersistenceError> {
        self.resolve_tracked(hostname, daemon_name)
            .await
            .map(|resolved| resolved.id)
    }

    /// Like [`ClientRegistry::resolve`], also telling whether the store was queried.
    /// An `Err` always comes from a store query.
    pub async fn resolve_tracked(
        &self,
        hostname: &str,
        daemon_name: &str,
    ) -> Result<ResolvedClient, PersistenceError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients
            .iter()
            .find(|c| c.hostname == hostname && c.daemon_name == daemon_name)
        {
            return Ok(ResolvedClient {
                id: client.id,
                queried: false,
            });
        }

        let id = self.store.upsert_client(hostname, daemon_name).await?;
        info!(
            "Registered client {}/{} with id {}",
            hostname, daemon_name, id
        );
        clients.push(ClientRecord {
            id,
            hostname: hostname.to_string(),
            daemon_name: daemon_name.to_string(),
        });
        debug!("{} client(s) cached", clients.len());
        Ok(ResolvedClient { id, queried: true })
    }

    pub async fn cached(&self) -> Vec<ClientRecord> {
        self.clients.lock().await.clone()
    }
}
