use crate::error_handling::types::SessionError;
use crate::network::whitelist::WhitelistMatcher;
use crate::session_management::message::{Message, MessageHandle};
use crate::SessionStatus;
use chrono::{DateTime, Utc};
use log::trace;
use uuid::Uuid;

/// One MTA connection as seen through the milter protocol.
///
/// The protocol handler owns the session exclusively while it is `Open` and fills in the
/// negotiated attributes as they arrive. Once persistence has been requested on a closed
/// session the live struct can be dropped; only the encoded record survives.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    time_start: DateTime<Utc>,
    time_end: Option<DateTime<Utc>>,
    messages: Vec<Message>,
    status: SessionStatus,

    sasl_username: String,
    sasl_sender: String,
    sasl_method: String,
    cert_issuer: String,
    cert_subject: String,
    cipher_bits: u32,
    cipher: String,
    tls_version: String,
    ip: String,
    reverse_dns: String,
    hostname: String,
    helo: String,
    mta_hostname: String,
    mta_daemon_name: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_start(Uuid::new_v4(), Utc::now())
    }

    pub fn with_start(id: Uuid, time_start: DateTime<Utc>) -> Self {
        trace!("[{}] session opened", id);
        Self {
            id,
            time_start,
            time_end: None,
            messages: Vec::new(),
            status: SessionStatus::Open,
            sasl_username: String::new(),
            sasl_sender: String::new(),
            sasl_method: String::new(),
            cert_issuer: String::new(),
            cert_subject: String::new(),
            cipher_bits: 0,
            cipher: String::new(),
            tls_version: String::new(),
            ip: String::new(),
            reverse_dns: String::new(),
            hostname: String::new(),
            helo: String::new(),
            mta_hostname: String::new(),
            mta_daemon_name: String::new(),
        }
    }

    /// Appends a new message and returns its handle; creation order is preserved.
    pub fn create_message(&mut self) -> MessageHandle {
        let message = Message::new(self.id, self.messages.len());
        let handle = message.handle();
        self.messages.push(message);
        handle
    }

    /// Most recently created message, `None` before the first `create_message`.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn close(&mut self) -> Result<(), SessionError> {
        self.close_at(Utc::now())
    }

    /// Records the disconnect time. Only valid once, on an open session.
    pub fn close_at(&mut self, time_end: DateTime<Utc>) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Open => {
                self.time_end = Some(time_end);
                self.status = SessionStatus::Closed;
                trace!("[{}] session closed", self.id);
                Ok(())
            }
            _ => Err(SessionError::AlreadyClosed),
        }
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.status = SessionStatus::Persisted;
    }

    pub fn is_persisted(&self) -> bool {
        self.status == SessionStatus::Persisted
    }

    pub fn is_whitelisted(&self, whitelist: &WhitelistMatcher) -> bool {
        whitelist.contains(&self.ip)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn time_start(&self) -> DateTime<Utc> {
        self.time_start
    }

    pub fn time_end(&self) -> Option<DateTime<Utc>> {
        self.time_end
    }

    pub fn sasl_username(&self) -> &str {
        &self.sasl_username
    }

    pub fn sasl_sender(&self) -> &str {
        &self.sasl_sender
    }

    pub fn sasl_method(&self) -> &str {
        &self.sasl_method
    }

    pub fn cert_issuer(&self) -> &str {
        &self.cert_issuer
    }

    pub fn cert_subject(&self) -> &str {
        &self.cert_subject
    }

    pub fn cipher_bits(&self) -> u32 {
        self.cipher_bits
    }

    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    pub fn tls_version(&self) -> &str {
        &self.tls_version
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn reverse_dns(&self) -> &str {
        &self.reverse_dns
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn helo(&self) -> &str {
        &self.helo
    }

    pub fn mta_hostname(&self) -> &str {
        &self.mta_hostname
    }

    pub fn mta_daemon_name(&self) -> &str {
        &self.mta_daemon_name
    }

    // Setters are called by the protocol handler as each attribute is negotiated.

    pub fn set_sasl_username(&mut self, value: impl Into<String>) -> &mut Self {
        self.sasl_username = value.into();
        self
    }

    pub fn set_sasl_sender(&mut self, value: impl Into<String>) -> &mut Self {
        self.sasl_sender = value.into();
        self
    }

    pub fn set_sasl_method(&mut self, value: impl Into<String>) -> &mut Self {
        self.sasl_method = value.into();
        self
    }

    pub fn set_cert_issuer(&mut self, value: impl Into<String>) -> &mut Self {
        self.cert_issuer = value.into();
        self
    }

    pub fn set_cert_subject(&mut self, value: impl Into<String>) -> &mut Self {
        self.cert_subject = value.into();
        self
    }

    pub fn set_cipher_bits(&mut self, value: u32) -> &mut Self {
        self.cipher_bits = value;
        self
    }

    pub fn set_cipher(&mut self, value: impl Into<String>) -> &mut Self {
        self.cipher = value.into();
        self
    }

    pub fn set_tls_version(&mut self, value: impl Into<String>) -> &mut Self {
        self.tls_version = value.into();
        self
    }

    pub fn set_ip(&mut self, value: impl Into<String>) -> &mut Self {
        self.ip = value.into();
        self
    }

    pub fn set_reverse_dns(&mut self, value: impl Into<String>) -> &mut Self {
        self.reverse_dns = value.into();
        self
    }

    pub fn set_hostname(&mut self, value: impl Into<String>) -> &mut Self {
        self.hostname = value.into();
        self
    }

    pub fn set_helo(&mut self, value: impl Into<String>) -> &mut Self {
        self.helo = value.into();
        self
    }

    pub fn set_mta_hostname(&mut self, value: impl Into<String>) -> &mut Self {
        self.mta_hostname = value.into();
        self
    }

    pub fn set_mta_daemon_name(&mut self, value: impl Into<String>) -> &mut Self {
        self.mta_daemon_name = value.into();
        self
    }
}
