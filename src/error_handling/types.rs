use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    AlreadyClosed,
    AlreadyPersisted,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyClosed => write!(f, "Session already closed"),
            SessionError::AlreadyPersisted => write!(f, "Session already persisted"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    Malformed(String),
    UnsupportedVersion(u32),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "Malformed session record: {}", e),
            DecodeError::UnsupportedVersion(v) => {
                write!(f, "Unsupported session record version: {}", v)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug)]
pub enum PersistenceError {
    ConnectionFailed(String),
    WriteFailed(String),
    ReadFailed(String),
    Timeout,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            PersistenceError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            PersistenceError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
            PersistenceError::Timeout => write!(f, "Storage operation timed out"),
        }
    }
}

impl std::error::Error for PersistenceError {}

#[derive(Debug)]
pub enum TransportError {
    ChannelClosed,
    PublishFailed(String),
    ReceiveFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ChannelClosed => write!(f, "Queue channel closed"),
            TransportError::PublishFailed(e) => write!(f, "Queue publish failed: {}", e),
            TransportError::ReceiveFailed(e) => write!(f, "Queue receive failed: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug)]
pub enum PipelineError {
    Session(SessionError),
    Encode(String),
    QueueClosed,
    Decode(DecodeError),
    Persistence(PersistenceError),
    Transport(TransportError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Session(e) => write!(f, "Session error: {}", e),
            PipelineError::Encode(e) => write!(f, "Encoding error: {}", e),
            PipelineError::QueueClosed => write!(f, "Persist queue closed"),
            PipelineError::Decode(e) => write!(f, "Decode error: {}", e),
            PipelineError::Persistence(e) => write!(f, "Persistence error: {}", e),
            PipelineError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<SessionError> for PipelineError {
    fn from(err: SessionError) -> Self {
        PipelineError::Session(err)
    }
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        PipelineError::Decode(err)
    }
}

impl From<PersistenceError> for PipelineError {
    fn from(err: PersistenceError) -> Self {
        PipelineError::Persistence(err)
    }
}

impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        PipelineError::Transport(err)
    }
}
