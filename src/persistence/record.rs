//! Wire format of a persisted session.
//!
//! Records are JSON documents carrying a `version` field. Unknown fields are ignored
//! and every optional field has a default, so producers and consumers running
//! different builds can share a queue as long as fields are only ever added.
//! `version` only changes on incompatible layout changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_handling::types::{DecodeError, PipelineError};
use crate::session_management::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    /// Process group that produced the record
    pub instance_id: u64,
    pub id: Uuid,
    /// Unix seconds
    pub time_start: i64,
    /// Unix seconds; `None` while the session is still open
    #[serde(default)]
    pub time_end: Option<i64>,
    #[serde(default)]
    pub sasl_username: String,
    #[serde(default)]
    pub sasl_sender: String,
    #[serde(default)]
    pub sasl_method: String,
    #[serde(default)]
    pub cert_issuer: String,
    #[serde(default)]
    pub cert_subject: String,
    #[serde(default)]
    pub cipher_bits: u32,
    #[serde(default)]
    pub cipher: String,
    #[serde(default)]
    pub tls_version: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub reverse_dns: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub helo: String,
    #[serde(default)]
    pub mta_hostname: String,
    #[serde(default)]
    pub mta_daemon_name: String,
    /// Filled in by the consuming process once the reporting node is resolved
    #[serde(default)]
    pub client_id: Option<u64>,
}

impl SessionRecord {
    pub const VERSION: u32 = 1;

    /// Snapshot of `session` as produced by `instance_id`.
    ///
    /// The client id is left unresolved; the consumer resolves it against its own
    /// database connection.
    pub fn from_session(session: &Session, instance_id: u64) -> Self {
        Self {
            version: Self::VERSION,
            instance_id,
            id: session.id(),
            time_start: session.time_start().timestamp(),
            time_end: session.time_end().map(|t| t.timestamp()),
            sasl_username: session.sasl_username().to_string(),
            sasl_sender: session.sasl_sender().to_string(),
            sasl_method: session.sasl_method().to_string(),
            cert_issuer: session.cert_issuer().to_string(),
            cert_subject: session.cert_subject().to_string(),
            cipher_bits: session.cipher_bits(),
            cipher: session.cipher().to_string(),
            tls_version: session.tls_version().to_string(),
            ip: session.ip().to_string(),
            reverse_dns: session.reverse_dns().to_string(),
            hostname: session.hostname().to_string(),
            helo: session.helo().to_string(),
            mta_hostname: session.mta_hostname().to_string(),
            mta_daemon_name: session.mta_daemon_name().to_string(),
            client_id: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(self).map_err(|e| PipelineError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let record: SessionRecord =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if record.version != Self::VERSION {
            return Err(DecodeError::UnsupportedVersion(record.version));
        }
        Ok(record)
    }

    pub fn time_start_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_start, 0)
    }

    pub fn time_end_utc(&self) -> Option<DateTime<Utc>> {
        self.time_end.and_then(|t| DateTime::from_timestamp(t, 0))
    }
}

/// Encodes `session` into the bytes placed on the persist queue.
pub fn encode(session: &Session, instance_id: u64) -> Result<Vec<u8>, PipelineError> {
    SessionRecord::from_session(session, instance_id).encode()
}

pub fn decode(bytes: &[u8]) -> Result<SessionRecord, DecodeError> {
    SessionRecord::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_session() -> Session {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut session = Session::with_start(Uuid::new_v4(), t0);
        session
            .set_sasl_username("alice")
            .set_sasl_sender("alice@example.com")
            .set_sasl_method("LOGIN")
            .set_cert_issuer("CN=Example CA")
            .set_cert_subject("CN=client")
            .set_cipher_bits(128)
            .set_cipher("ECDHE-RSA-AES128-GCM-SHA256")
            .set_tls_version("TLSv1.2")
            .set_ip("203.0.113.9")
            .set_reverse_dns("host.example.net")
            .set_hostname("host.example.net")
            .set_helo("mail.example.com")
            .set_mta_hostname("gateway-1")
            .set_mta_daemon_name("smtpd");
        session
    }

    #[test]
    fn test_open_session_round_trip_keeps_disconnect_unset() {
        let session = sample_session();
        let bytes = encode(&session, 42).unwrap();
        let decoded = decode(&bytes).unwrap();

        let expected = SessionRecord {
            version: SessionRecord::VERSION,
            instance_id: 42,
            id: session.id(),
            time_start: 1714564800,
            time_end: None,
            sasl_username: "alice".into(),
            sasl_sender: "alice@example.com".into(),
            sasl_method: "LOGIN".into(),
            cert_issuer: "CN=Example CA".into(),
            cert_subject: "CN=client".into(),
            cipher_bits: 128,
            cipher: "ECDHE-RSA-AES128-GCM-SHA256".into(),
            tls_version: "TLSv1.2".into(),
            ip: "203.0.113.9".into(),
            reverse_dns: "host.example.net".into(),
            hostname: "host.example.net".into(),
            helo: "mail.example.com".into(),
            mta_hostname: "gateway-1".into(),
            mta_daemon_name: "smtpd".into(),
            client_id: None,
        };
        assert_eq!(decoded, expected);
        assert_eq!(decoded.time_end_utc(), None);
        assert_eq!(decoded.time_start_utc(), Some(session.time_start()));
    }

    #[test]
    fn test_closed_session_encodes_disconnect_time() {
        let mut session = sample_session();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 20).unwrap();
        session.close_at(t1).unwrap();

        let decoded = decode(&encode(&session, 1).unwrap()).unwrap();
        assert_eq!(decoded.time_end, Some(t1.timestamp()));
        assert_eq!(decoded.time_end_utc(), Some(t1));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let bytes = encode(&sample_session(), 1).unwrap();
        for len in [0, 1, bytes.len() / 2, bytes.len() - 1] {
            let err = decode(&bytes[..len]).unwrap_err();
            assert!(matches!(err, DecodeError::Malformed(_)), "len {len}");
        }
    }

    #[test]
    fn test_corrupt_input_is_rejected() {
        let mut bytes = encode(&sample_session(), 1).unwrap();
        bytes[0] = 0xff;
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed(_))));

        let bad_id = br#"{"version":1,"instance_id":1,"id":"not-a-uuid","time_start":0}"#;
        assert!(matches!(decode(bad_id), Err(DecodeError::Malformed(_))));

        let missing_start = br#"{"version":1,"instance_id":1,"id":"67e55044-10b1-426f-9247-bb680e5fe0c8"}"#;
        assert!(matches!(decode(missing_start), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let bytes = br#"{"version":2,"instance_id":1,"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","time_start":0}"#;
        assert_eq!(decode(bytes), Err(DecodeError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_unknown_fields_are_ignored_and_missing_fields_default() {
        let bytes = br#"{
            "version": 1,
            "instance_id": 9,
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "time_start": 1700000000,
            "helo": "mx.example.org",
            "spf_result": "pass"
        }"#;
        let record = decode(bytes).unwrap();
        assert_eq!(record.instance_id, 9);
        assert_eq!(record.helo, "mx.example.org");
        assert_eq!(record.time_end, None);
        assert_eq!(record.cipher_bits, 0);
        assert!(record.mta_hostname.is_empty());
    }
}
