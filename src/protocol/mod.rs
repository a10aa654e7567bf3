//! Minecraft Java Edition protocol implementation.

pub mod buffer;
pub mod codec;
pub mod context;
pub mod encryption;
pub mod packets;
pub mod reactor;
pub mod types;

pub use buffer::PacketBuffer;
pub use codec::{MinecraftCodec, TransportOptions};
pub use context::{Context, ModEntry};
pub use reactor::{Action, Event, Reactor};
