use thiserror::Error;

/// Startup configuration problems. Always fatal, reported before any I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown device type {0:?}")]
    UnknownDeviceType(String),
    #[error("unit address {0} is out of range (1-247)")]
    InvalidUnitAddress(u8),
    #[error("unit address {0} configured more than once")]
    DuplicateUnitAddress(u8),
    #[error("no units configured")]
    NoUnits,
    #[error("transport needs exactly one of `serial` or `host`")]
    MissingTransport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionLost,
    Protocol,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::ConnectionLost => "connection lost",
            Self::Protocol => "protocol error",
            Self::Other => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionLost, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    /// The link can't be trusted after a timeout or a dropped connection; there is no
    /// mid-transaction resync on the field bus.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout | TransportErrorKind::ConnectionLost
        )
    }

    pub fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;

        let kind = match err.kind() {
            TimedOut => TransportErrorKind::Timeout,
            BrokenPipe | ConnectionReset | ConnectionAborted | NotConnected | UnexpectedEof => {
                TransportErrorKind::ConnectionLost
            }
            InvalidData => TransportErrorKind::Protocol,
            _ => TransportErrorKind::Other,
        };

        Self::new(kind, err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("block {block}: expected {expected} bytes, got {actual}")]
    Length {
        block: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("block {block}: field {field} runs past the end of the block")]
    Truncated {
        block: &'static str,
        field: &'static str,
    },
    #[error("implausible {field} = {value} (limit {limit})")]
    Implausible {
        field: &'static str,
        value: f64,
        limit: f64,
    },
}

/// Failures of an inbound command. These are always published on the command's result
/// topic, never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("{0} is read-only")]
    NotWritable(String),
    #[error("{0} can't be queried")]
    NotQueryable(String),
    #[error("{name}: value {value} out of range")]
    ValueOutOfRange { name: String, value: f64 },
    #[error("unknown serial {0}")]
    UnknownSerial(String),
    #[error("invalid payload {0:?}")]
    InvalidPayload(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CommandError {
    pub fn fatal_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) if e.is_fatal() => Some(e),
            _ => None,
        }
    }
}
