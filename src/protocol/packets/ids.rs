//! Packet ids per protocol version.
//!
//! Play ids moved around with nearly every release; the tables below cover
//! the releases listed in [`crate::protocol::context::SUPPORTED_PROTOCOL_VERSIONS`].

use crate::protocol::context::Context;
use crate::protocol::packets::{Direction, PacketKind, Phase};

/// First protocol with the login plugin request/response pair (1.13-pre).
pub const LOGIN_PLUGIN_SINCE: i32 = 385;

/// First protocol with the teleport confirmation packet (1.9).
pub const TELEPORT_CONFIRM_SINCE: i32 = 107;

/// Release bands sharing a Play id layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayBand {
    V1_8,
    V1_9,
    V1_12,
    V1_12_1,
    V1_13,
    V1_14,
    V1_15,
    V1_16,
    V1_16_2,
}

fn play_band(ctx: &Context) -> PlayBand {
    match ctx.protocol_version {
        v if v < 107 => PlayBand::V1_8,
        v if v < 335 => PlayBand::V1_9,
        v if v < 338 => PlayBand::V1_12,
        v if v < 393 => PlayBand::V1_12_1,
        v if v < 477 => PlayBand::V1_13,
        v if v < 573 => PlayBand::V1_14,
        v if v < 735 => PlayBand::V1_15,
        v if v < 751 => PlayBand::V1_16,
        _ => PlayBand::V1_16_2,
    }
}

// ============================================================================
// Clientbound
// ============================================================================

/// Status phase, server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Response,
    Pong,
}

impl PacketKind for StatusKind {
    const ALL: &'static [Self] = &[StatusKind::Response, StatusKind::Pong];

    fn id(self, _ctx: &Context) -> Option<i32> {
        Some(match self {
            StatusKind::Response => 0x00,
            StatusKind::Pong => 0x01,
        })
    }

    fn name(self) -> &'static str {
        match self {
            StatusKind::Response => "response",
            StatusKind::Pong => "pong",
        }
    }
}

/// Login phase, server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginKind {
    Disconnect,
    EncryptionRequest,
    LoginSuccess,
    SetCompression,
    PluginRequest,
}

impl PacketKind for LoginKind {
    const ALL: &'static [Self] = &[
        LoginKind::Disconnect,
        LoginKind::EncryptionRequest,
        LoginKind::LoginSuccess,
        LoginKind::SetCompression,
        LoginKind::PluginRequest,
    ];

    fn id(self, ctx: &Context) -> Option<i32> {
        match self {
            LoginKind::Disconnect => Some(0x00),
            LoginKind::EncryptionRequest => Some(0x01),
            LoginKind::LoginSuccess => Some(0x02),
            LoginKind::SetCompression => Some(0x03),
            LoginKind::PluginRequest => {
                ctx.protocol_later_eq(LOGIN_PLUGIN_SINCE).then_some(0x04)
            }
        }
    }

    fn name(self) -> &'static str {
        match self {
            LoginKind::Disconnect => "disconnect",
            LoginKind::EncryptionRequest => "encryption request",
            LoginKind::LoginSuccess => "login success",
            LoginKind::SetCompression => "set compression",
            LoginKind::PluginRequest => "login plugin request",
        }
    }
}

/// Play phase, server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayKind {
    KeepAlive,
    PlayerPositionAndLook,
    Disconnect,
    SetCompression,
    PluginMessage,
}

impl PacketKind for PlayKind {
    const ALL: &'static [Self] = &[
        PlayKind::KeepAlive,
        PlayKind::PlayerPositionAndLook,
        PlayKind::Disconnect,
        PlayKind::SetCompression,
        PlayKind::PluginMessage,
    ];

    fn id(self, ctx: &Context) -> Option<i32> {
        use PlayBand::*;
        let band = play_band(ctx);
        match self {
            PlayKind::KeepAlive => Some(match band {
                V1_8 => 0x00,
                V1_9 | V1_12 | V1_12_1 => 0x1F,
                V1_13 => 0x21,
                V1_14 => 0x20,
                V1_15 => 0x21,
                V1_16 => 0x20,
                V1_16_2 => 0x1F,
            }),
            PlayKind::PlayerPositionAndLook => Some(match band {
                V1_8 => 0x08,
                V1_9 | V1_12 => 0x2E,
                V1_12_1 => 0x2F,
                V1_13 => 0x32,
                V1_14 => 0x35,
                V1_15 => 0x36,
                V1_16 => 0x35,
                V1_16_2 => 0x34,
            }),
            PlayKind::Disconnect => Some(match band {
                V1_8 => 0x40,
                V1_9 | V1_12 | V1_12_1 => 0x1A,
                V1_13 => 0x1B,
                V1_14 => 0x1A,
                V1_15 => 0x1B,
                V1_16 => 0x1A,
                V1_16_2 => 0x19,
            }),
            PlayKind::SetCompression => (band == V1_8).then_some(0x46),
            PlayKind::PluginMessage => Some(match band {
                V1_8 => 0x3F,
                V1_9 | V1_12 | V1_12_1 => 0x18,
                V1_13 => 0x19,
                V1_14 => 0x18,
                V1_15 => 0x19,
                V1_16 => 0x18,
                V1_16_2 => 0x17,
            }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PlayKind::KeepAlive => "keep alive",
            PlayKind::PlayerPositionAndLook => "player position and look",
            PlayKind::Disconnect => "disconnect",
            PlayKind::SetCompression => "set compression",
            PlayKind::PluginMessage => "plugin message",
        }
    }
}

/// The handshake phase has no clientbound vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeKind {}

impl PacketKind for HandshakeKind {
    const ALL: &'static [Self] = &[];

    fn id(self, _ctx: &Context) -> Option<i32> {
        match self {}
    }

    fn name(self) -> &'static str {
        match self {}
    }
}

// ============================================================================
// Serverbound
// ============================================================================

/// Every packet kind the client sends, across all phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerboundKind {
    Handshake,
    StatusRequest,
    Ping,
    LoginStart,
    EncryptionResponse,
    LoginPluginResponse,
    KeepAlive,
    TeleportConfirm,
    PositionAndLook,
    PluginMessage,
}

impl ServerboundKind {
    pub fn phase(self) -> Phase {
        match self {
            ServerboundKind::Handshake => Phase::Handshake,
            ServerboundKind::StatusRequest | ServerboundKind::Ping => Phase::Status,
            ServerboundKind::LoginStart
            | ServerboundKind::EncryptionResponse
            | ServerboundKind::LoginPluginResponse => Phase::Login,
            ServerboundKind::KeepAlive
            | ServerboundKind::TeleportConfirm
            | ServerboundKind::PositionAndLook
            | ServerboundKind::PluginMessage => Phase::Play,
        }
    }

    pub fn direction(self) -> Direction {
        Direction::Serverbound
    }
}

impl PacketKind for ServerboundKind {
    const ALL: &'static [Self] = &[
        ServerboundKind::Handshake,
        ServerboundKind::StatusRequest,
        ServerboundKind::Ping,
        ServerboundKind::LoginStart,
        ServerboundKind::EncryptionResponse,
        ServerboundKind::LoginPluginResponse,
        ServerboundKind::KeepAlive,
        ServerboundKind::TeleportConfirm,
        ServerboundKind::PositionAndLook,
        ServerboundKind::PluginMessage,
    ];

    fn id(self, ctx: &Context) -> Option<i32> {
        use PlayBand::*;
        let band = play_band(ctx);
        match self {
            ServerboundKind::Handshake => Some(0x00),
            ServerboundKind::StatusRequest => Some(0x00),
            ServerboundKind::Ping => Some(0x01),
            ServerboundKind::LoginStart => Some(0x00),
            ServerboundKind::EncryptionResponse => Some(0x01),
            ServerboundKind::LoginPluginResponse => {
                ctx.protocol_later_eq(LOGIN_PLUGIN_SINCE).then_some(0x02)
            }
            ServerboundKind::KeepAlive => Some(match band {
                V1_8 => 0x00,
                V1_9 => 0x0B,
                V1_12 => 0x0C,
                V1_12_1 => 0x0B,
                V1_13 => 0x0E,
                V1_14 | V1_15 => 0x0F,
                V1_16 | V1_16_2 => 0x10,
            }),
            ServerboundKind::TeleportConfirm => {
                ctx.protocol_later_eq(TELEPORT_CONFIRM_SINCE).then_some(0x00)
            }
            ServerboundKind::PositionAndLook => Some(match band {
                V1_8 => 0x06,
                V1_9 => 0x0D,
                V1_12 => 0x0F,
                V1_12_1 => 0x0E,
                V1_13 => 0x11,
                V1_14 | V1_15 => 0x12,
                V1_16 | V1_16_2 => 0x13,
            }),
            ServerboundKind::PluginMessage => Some(match band {
                V1_8 => 0x17,
                V1_9 => 0x09,
                V1_12 => 0x0A,
                V1_12_1 => 0x09,
                V1_13 => 0x0A,
                V1_14 | V1_15 | V1_16 | V1_16_2 => 0x0B,
            }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ServerboundKind::Handshake => "handshake",
            ServerboundKind::StatusRequest => "request",
            ServerboundKind::Ping => "ping",
            ServerboundKind::LoginStart => "login start",
            ServerboundKind::EncryptionResponse => "encryption response",
            ServerboundKind::LoginPluginResponse => "login plugin response",
            ServerboundKind::KeepAlive => "keep alive",
            ServerboundKind::TeleportConfirm => "teleport confirm",
            ServerboundKind::PositionAndLook => "position and look",
            ServerboundKind::PluginMessage => "plugin message",
        }
    }
}
