use serde::{Deserialize, Serialize};

/// A reporting node (MTA host + daemon) with the id the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: u64,
    pub hostname: String,
    pub daemon_name: String,
}

/// Session row as stored in the `session` table.
///
/// Timestamps are Unix seconds; `date_disconnect` is NULL until a record carrying a
/// disconnect time has been upserted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredSession {
    pub id: String,
    pub instance_id: i64,
    pub client_id: Option<i64>,
    pub date_connect: i64,
    pub date_disconnect: Option<i64>,
    pub ip: String,
    pub reverse_dns: String,
    pub hostname: String,
    pub helo: String,
    pub sasl_username: String,
    pub sasl_sender: String,
    pub sasl_method: String,
    pub cert_issuer: String,
    pub cert_subject: String,
    pub cipher_bits: i64,
    pub cipher: String,
    pub tls_version: String,
}
