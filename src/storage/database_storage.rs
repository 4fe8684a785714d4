use std::env;
use std::path::Path;

use async_trait::async_trait;
use log::{debug, error, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::configuration::types::DatabaseConfig;
use crate::error_handling::types::PersistenceError;
use crate::persistence::record::SessionRecord;
use crate::storage::storage_trait::SessionStore;
use crate::storage::types::{ClientRecord, StoredSession};

const SESSION_UPSERT: &str = "
    INSERT INTO session (id, instance_id, client_id, date_connect, date_disconnect, ip,
                         reverse_dns, hostname, helo, sasl_username, sasl_sender, sasl_method,
                         cert_issuer, cert_subject, cipher_bits, cipher, tls_version)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
    ON CONFLICT(id) DO UPDATE SET
        date_disconnect = COALESCE(excluded.date_disconnect, session.date_disconnect)";

const CLIENT_UPSERT: &str = "
    INSERT INTO client (hostname, daemon_name) VALUES (?1, ?2)
    ON CONFLICT(hostname, daemon_name) DO UPDATE SET hostname = excluded.hostname
    RETURNING id";

/// SQLite-backed relational store.
pub struct DatabaseStorage {
    pool: Pool<Sqlite>,
}

impl DatabaseStorage {
    /// Default database filename used in the application's working directory
    const DEFAULT_DB_FILE: &'static str = "mailgate.sqlite3";

    /// Opens the database named by `MAILGATE_DB_PATH`, or the default file in the
    /// current working directory.
    pub async fn new() -> Result<Self, PersistenceError> {
        if let Ok(path) = env::var("MAILGATE_DB_PATH") {
            info!("Using database from MAILGATE_DB_PATH: {}", path);
            return Self::new_file(path).await;
        }
        let cwd = env::current_dir().map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?;
        Self::new_file(cwd.join(Self::DEFAULT_DB_FILE)).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        match &config.path {
            Some(path) => Self::new_file(path).await,
            None => Self::new().await,
        }
    }

    pub async fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create database dir {}: {}", parent.display(), e);
                PersistenceError::ConnectionFailed(e.to_string())
            })?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| {
                error!("Failed to open database {}: {}", path.display(), e);
                PersistenceError::ConnectionFailed(e.to_string())
            })?;
        Self::create_schema(&pool).await?;
        info!("DatabaseStorage initialized at {}", path.display());
        Ok(Self { pool })
    }

    async fn create_schema(pool: &Pool<Sqlite>) -> Result<(), PersistenceError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS client (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hostname TEXT NOT NULL,
                daemon_name TEXT NOT NULL,
                UNIQUE (hostname, daemon_name)
            );",
        )
        .execute(pool)
        .await
        .map_err(write_failed)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS session (
                id TEXT PRIMARY KEY,
                instance_id INTEGER NOT NULL,
                client_id INTEGER REFERENCES client(id),
                date_connect INTEGER NOT NULL,
                date_disconnect INTEGER,
                ip TEXT NOT NULL,
                reverse_dns TEXT NOT NULL,
                hostname TEXT NOT NULL,
                helo TEXT NOT NULL,
                sasl_username TEXT NOT NULL,
                sasl_sender TEXT NOT NULL,
                sasl_method TEXT NOT NULL,
                cert_issuer TEXT NOT NULL,
                cert_subject TEXT NOT NULL,
                cipher_bits INTEGER NOT NULL,
                cipher TEXT NOT NULL,
                tls_version TEXT NOT NULL
            );",
        )
        .execute(pool)
        .await
        .map_err(write_failed)?;
        Ok(())
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Option<StoredSession>, PersistenceError> {
        sqlx::query_as::<_, StoredSession>(
            "SELECT id, instance_id, client_id, date_connect, date_disconnect, ip, reverse_dns,
                    hostname, helo, sasl_username, sasl_sender, sasl_method, cert_issuer,
                    cert_subject, cipher_bits, cipher, tls_version
               FROM session WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)
    }

    pub async fn count_sessions(&self) -> Result<u64, PersistenceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session")
            .fetch_one(&self.pool)
            .await
            .map_err(read_failed)?;
        Ok(count as u64)
    }

    pub async fn get_clients(&self) -> Result<Vec<ClientRecord>, PersistenceError> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, hostname, daemon_name FROM client ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(read_failed)?;
        Ok(rows
            .into_iter()
            .map(|(id, hostname, daemon_name)| ClientRecord {
                id: id as u64,
                hostname,
                daemon_name,
            })
            .collect())
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn upsert_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        sqlx::query(SESSION_UPSERT)
            .bind(record.id.to_string())
            .bind(record.instance_id as i64)
            .bind(record.client_id.map(|id| id as i64))
            .bind(record.time_start)
            .bind(record.time_end)
            .bind(&record.ip)
            .bind(&record.reverse_dns)
            .bind(&record.hostname)
            .bind(&record.helo)
            .bind(&record.sasl_username)
            .bind(&record.sasl_sender)
            .bind(&record.sasl_method)
            .bind(&record.cert_issuer)
            .bind(&record.cert_subject)
            .bind(i64::from(record.cipher_bits))
            .bind(&record.cipher)
            .bind(&record.tls_version)
            .execute(&self.pool)
            .await
            .map_err(write_failed)?;
        debug!("[{}] session row upserted", record.id);
        Ok(())
    }

    async fn upsert_client(
        &self,
        hostname: &str,
        daemon_name: &str,
    ) -> Result<u64, PersistenceError> {
        let id: i64 = sqlx::query_scalar(CLIENT_UPSERT)
            .bind(hostname)
            .bind(daemon_name)
            .fetch_one(&self.pool)
            .await
            .map_err(write_failed)?;
        Ok(id as u64)
    }
}

fn write_failed(e: sqlx::Error) -> PersistenceError {
    error!("Database write failed: {}", e);
    PersistenceError::WriteFailed(e.to_string())
}

fn read_failed(e: sqlx::Error) -> PersistenceError {
    error!("Database read failed: {}", e);
    PersistenceError::ReadFailed(e.to_string())
}
