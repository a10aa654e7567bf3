//! Error types for the protocol client.

use thiserror::Error;

/// Malformed wire data. Fatal to the connection it was read from.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("VarInt is too big (more than {max_bytes} bytes)")]
    VarIntTooLong { max_bytes: usize },

    #[error("Unexpected end of packet data: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("String too long: {len} bytes exceeds the maximum of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("Invalid string encoding: {message}")]
    InvalidString { message: String },

    #[error("Invalid value {value} for {name}")]
    InvalidEnum { name: &'static str, value: i64 },

    #[error("Negative length {length} for {what}")]
    NegativeLength { what: &'static str, length: i32 },

    #[error("Frame of {length} bytes exceeds the maximum of {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("Decompressed length {actual}, but expected {declared}")]
    DecompressedLengthMismatch { declared: usize, actual: usize },

    #[error("Compression error: {message}")]
    Compression { message: String },

    #[error("Encryption error: {message}")]
    Encryption { message: String },

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The server refused the login attempt.
#[derive(Debug, Clone, Error)]
#[error("The server rejected our login attempt with: \"{reason}\"")]
pub struct LoginRejection {
    /// Reason text extracted from the disconnect message.
    pub reason: String,
    /// Server version named by an "Outdated client/server" rejection.
    pub server_version: Option<String>,
}

/// Credential and session server failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access token expired")]
    TokenExpired,

    #[error("Session server request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session server returned {status}: {message}")]
    Session { status: u16, message: String },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors terminating a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    LoginRejected(#[from] LoginRejection),

    #[error("Invalid server status")]
    InvalidServerStatus,

    #[error("Unexpected {packet} packet while in {phase} phase")]
    UnexpectedPacket { phase: String, packet: String },

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Whether the error was caused by the stream ending mid-exchange.
    pub fn is_eof(&self) -> bool {
        match self {
            ConnectionError::ConnectionClosed => true,
            ConnectionError::Io(e) | ConnectionError::Protocol(ProtocolError::Io(e)) => {
                e.kind() == std::io::ErrorKind::UnexpectedEof
            }
            ConnectionError::Protocol(ProtocolError::UnexpectedEof { .. }) => true,
            _ => false,
        }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;
