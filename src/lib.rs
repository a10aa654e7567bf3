//! Minecart - headless Minecraft Java Edition protocol client.
//!
//! Speaks the handshake, status, login and play phases of protocols 47
//! (1.8) through 754 (1.16.5), including compression, the AES/CFB8 stream
//! cipher, session server joins and the Forge mod-list handshake.

pub mod auth;
pub mod client;
pub mod common;
pub mod config;
pub mod protocol;
