//! Game server connection.

pub mod connection;

pub use connection::Connection;
