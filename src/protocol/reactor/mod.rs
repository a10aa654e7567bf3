//! Phase state machine.
//!
//! One reactor is active per connection. Each owns the packet tables valid
//! in its phase, built once from the [`Context`], and turns every decoded
//! packet into a list of [`Action`]s for the connection to carry out in
//! order. Reactors never touch the socket themselves.

pub mod login;
pub mod play;
pub mod status;

use bytes::Bytes;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::common::error::{ConnectionError, ConnectionResult, ProtocolResult};
use crate::protocol::context::Context;
use crate::protocol::packets::handshake::HandshakeClientbound;
use crate::protocol::packets::ids::HandshakeKind;
use crate::protocol::packets::login::LoginClientbound;
use crate::protocol::packets::play::PlayClientbound;
use crate::protocol::packets::status::{ServerStatus, StatusClientbound};
use crate::protocol::packets::{Phase, Registry, Serverbound};

pub use login::LoginReactor;
pub use play::PlayReactor;
pub use status::{StatusMode, StatusReactor};

/// Effect requested by a reactor.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Queue a packet behind anything already waiting.
    Send(Serverbound),
    /// Write a packet immediately, ahead of the queue and of any transport
    /// change that follows it in the same batch.
    SendForced(Serverbound),
    /// Announce the login to the session server.
    JoinSession { server_hash: String },
    EnableEncryption { shared_secret: Vec<u8> },
    EnableCompression { threshold: i32 },
    /// Replace the active reactor with a fresh one for `Phase`.
    Transition(Phase),
    /// Close the connection. Cooperative unless `immediate`.
    Disconnect { immediate: bool },
    /// Surface something to whoever drives the connection.
    Report(Event),
}

/// Outcome reported to the driving collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(ServerStatus),
    /// Round-trip time of the status ping, in milliseconds.
    Latency(i64),
    /// Protocol version to log in with, decided by a status probe.
    ProtocolSelected(i32),
    /// The server speaks a version this connection may not use.
    VersionMismatch {
        server_protocol: Option<i32>,
        server_version: Option<String>,
    },
    LoggedIn { uuid: Uuid, username: String },
    Spawned,
    Disconnected { reason: String },
}

/// A decoded packet, tagged with the phase that decoded it.
#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    Handshake(HandshakeClientbound),
    Status(StatusClientbound),
    Login(LoginClientbound),
    Play(PlayClientbound),
}

/// Initial phase. The server has nothing to say here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReactor {
    packets: Registry<HandshakeKind>,
}

impl HandshakeReactor {
    pub fn new(ctx: &Context) -> Self {
        Self {
            packets: Registry::build(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reactor {
    Handshake(HandshakeReactor),
    Status(StatusReactor),
    Login(LoginReactor),
    Play(PlayReactor),
}

impl Reactor {
    pub fn handshake(ctx: &Context) -> Self {
        Reactor::Handshake(HandshakeReactor::new(ctx))
    }

    /// Fresh reactor for `phase`. Status reactors built this way only query.
    pub fn for_phase(phase: Phase, ctx: &Context) -> Self {
        match phase {
            Phase::Handshake => Reactor::handshake(ctx),
            Phase::Status => Reactor::Status(StatusReactor::new(StatusMode::default(), ctx)),
            Phase::Login => Reactor::Login(LoginReactor::new(ctx)),
            Phase::Play => Reactor::Play(PlayReactor::new(ctx)),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Reactor::Handshake(_) => Phase::Handshake,
            Reactor::Status(_) => Phase::Status,
            Reactor::Login(_) => Phase::Login,
            Reactor::Play(_) => Phase::Play,
        }
    }

    /// Decode one packet body against this phase's tables.
    pub fn read_packet(&self, body: Bytes, ctx: &Context) -> ProtocolResult<Clientbound> {
        let packet = match self {
            Reactor::Handshake(r) => Clientbound::Handshake(r.packets.decode(body, ctx)?),
            Reactor::Status(r) => Clientbound::Status(r.read_packet(body, ctx)?),
            Reactor::Login(r) => Clientbound::Login(r.read_packet(body, ctx)?),
            Reactor::Play(r) => Clientbound::Play(r.read_packet(body, ctx)?),
        };
        trace!("<- {:?}", packet);
        Ok(packet)
    }

    pub fn react(&mut self, packet: Clientbound, ctx: &mut Context) -> ConnectionResult<Vec<Action>> {
        match (self, packet) {
            (Reactor::Status(r), Clientbound::Status(p)) => r.react(p, ctx),
            (Reactor::Login(r), Clientbound::Login(p)) => r.react(p, ctx),
            (Reactor::Play(r), Clientbound::Play(p)) => Ok(r.react(p, ctx)),
            (Reactor::Handshake(_), Clientbound::Handshake(HandshakeClientbound::Raw(raw))) => {
                debug!("Ignoring packet 0x{:02X} during handshake", raw.id);
                Ok(Vec::new())
            }
            (reactor, packet) => Err(ConnectionError::UnexpectedPacket {
                phase: format!("{:?}", reactor.phase()),
                packet: format!("{:?}", packet),
            }),
        }
    }

    /// Give the reactor a chance to swallow an error raised while reading
    /// or reacting. Returns the actions to run instead of failing; the
    /// connection is still torn down afterwards.
    pub fn absorb_error(&mut self, error: &ConnectionError, ctx: &Context) -> Option<Vec<Action>> {
        match self {
            Reactor::Status(r) => r.absorb_error(error, ctx),
            _ => None,
        }
    }
}
