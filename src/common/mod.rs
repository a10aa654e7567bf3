//! Common types shared across the client.

pub mod error;

pub use error::{
    AuthError, ConfigError, ConnectionError, ConnectionResult, LoginRejection, ProtocolError,
    ProtocolResult,
};
