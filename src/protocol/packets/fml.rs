//! Forge (FML) mod-list handshake, carried on the `FML|HS` channel.

use crate::common::error::{ProtocolError, ProtocolResult};
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::{Context, ModEntry};
use crate::protocol::packets::{PacketDecode, PacketEncode};
use crate::protocol::types::{
    read_enum, read_length, write_enum, write_str, Boolean, Byte, Integer, McString, VarInt,
    WireEnum, WireType,
};

const SERVER_HELLO: i8 = 0;
const CLIENT_HELLO: i8 = 1;
const MOD_LIST: i8 = 2;
const REGISTRY_DATA: i8 = 3;
const HANDSHAKE_ACK: i8 = -1;

/// Server side of the handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHandshakePhase {
    Start,
    Hello,
    WaitingCAck,
    Complete,
    Done,
    Error,
}

impl WireEnum for ServerHandshakePhase {
    type Repr = Byte;
    const NAME: &'static str = "ServerHandshakePhase";

    fn from_repr(value: i8) -> Option<Self> {
        use ServerHandshakePhase::*;
        Some(match value {
            0 => Start,
            1 => Hello,
            2 => WaitingCAck,
            3 => Complete,
            4 => Done,
            5 => Error,
            _ => return None,
        })
    }

    fn to_repr(self) -> i8 {
        self as i8
    }
}

/// Client side of the handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientHandshakePhase {
    Start,
    Hello,
    WaitingServerData,
    WaitingServerComplete,
    PendingComplete,
    Complete,
    Done,
    Error,
}

impl WireEnum for ClientHandshakePhase {
    type Repr = Byte;
    const NAME: &'static str = "ClientHandshakePhase";

    fn from_repr(value: i8) -> Option<Self> {
        use ClientHandshakePhase::*;
        Some(match value {
            0 => Start,
            1 => Hello,
            2 => WaitingServerData,
            3 => WaitingServerComplete,
            4 => PendingComplete,
            5 => Complete,
            6 => Done,
            7 => Error,
            _ => return None,
        })
    }

    fn to_repr(self) -> i8 {
        self as i8
    }
}

fn read_mods(buf: &mut PacketBuffer) -> ProtocolResult<Vec<ModEntry>> {
    let count = read_length(buf, "mod list")?;
    let mut mods = Vec::new();
    for _ in 0..count {
        let modid = McString::read(buf)?;
        let version = McString::read(buf)?;
        mods.push(ModEntry { modid, version });
    }
    Ok(mods)
}

fn write_mods(mods: &[ModEntry], buf: &mut PacketBuffer) -> ProtocolResult<()> {
    VarInt::write(&(mods.len() as i32), buf)?;
    for entry in mods {
        write_str(&entry.modid, buf)?;
        write_str(&entry.version, buf)?;
    }
    Ok(())
}

fn read_names(buf: &mut PacketBuffer, what: &'static str) -> ProtocolResult<Vec<String>> {
    let count = read_length(buf, what)?;
    (0..count).map(|_| McString::read(buf)).collect()
}

fn write_names(names: &[String], buf: &mut PacketBuffer) -> ProtocolResult<()> {
    VarInt::write(&(names.len() as i32), buf)?;
    for name in names {
        write_str(name, buf)?;
    }
    Ok(())
}

/// Server -> client handshake messages.
#[derive(Debug, Clone, PartialEq)]
pub enum FmlServerPacket {
    ServerHello {
        fml_protocol_version: i8,
        /// Only sent by FML protocol 2 and later.
        override_dimension: Option<i32>,
    },
    ServerModList {
        mods: Vec<ModEntry>,
    },
    RegistryData {
        has_more: bool,
        name: String,
        ids: Vec<(String, i32)>,
        substitutions: Vec<String>,
        dummies: Vec<String>,
    },
    ServerHandshakeAck {
        phase: ServerHandshakePhase,
    },
}

impl FmlServerPacket {
    pub fn name(&self) -> &'static str {
        match self {
            FmlServerPacket::ServerHello { .. } => "FML|HS:ServerHello",
            FmlServerPacket::ServerModList { .. } => "FML|HS:ServerModList",
            FmlServerPacket::RegistryData { .. } => "FML|HS:RegistryData",
            FmlServerPacket::ServerHandshakeAck { .. } => "FML|HS:ServerHandshakeAck",
        }
    }
}

impl PacketDecode for FmlServerPacket {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        let discriminator = Byte::read(buf)?;
        match discriminator {
            SERVER_HELLO => {
                let fml_protocol_version = Byte::read(buf)?;
                let override_dimension = if fml_protocol_version > 1 {
                    Some(Integer::read(buf)?)
                } else {
                    None
                };
                Ok(FmlServerPacket::ServerHello {
                    fml_protocol_version,
                    override_dimension,
                })
            }
            MOD_LIST => Ok(FmlServerPacket::ServerModList {
                mods: read_mods(buf)?,
            }),
            REGISTRY_DATA => {
                let has_more = Boolean::read(buf)?;
                let name = McString::read(buf)?;
                let count = read_length(buf, "registry ids")?;
                let mut ids = Vec::new();
                for _ in 0..count {
                    let entry = McString::read(buf)?;
                    ids.push((entry, VarInt::read(buf)?));
                }
                let substitutions = read_names(buf, "substitutions")?;
                // Older servers omit the dummy list entirely.
                let dummies = if buf.is_eof() {
                    Vec::new()
                } else {
                    read_names(buf, "dummies")?
                };
                Ok(FmlServerPacket::RegistryData {
                    has_more,
                    name,
                    ids,
                    substitutions,
                    dummies,
                })
            }
            HANDSHAKE_ACK => Ok(FmlServerPacket::ServerHandshakeAck {
                phase: read_enum(buf)?,
            }),
            other => Err(ProtocolError::InvalidEnum {
                name: "FML|HS discriminator",
                value: other as i64,
            }),
        }
    }
}

impl PacketEncode for FmlServerPacket {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        match self {
            FmlServerPacket::ServerHello {
                fml_protocol_version,
                override_dimension,
            } => {
                Byte::write(&SERVER_HELLO, buf)?;
                Byte::write(fml_protocol_version, buf)?;
                if *fml_protocol_version > 1 {
                    Integer::write(&override_dimension.unwrap_or_default(), buf)?;
                }
                Ok(())
            }
            FmlServerPacket::ServerModList { mods } => {
                Byte::write(&MOD_LIST, buf)?;
                write_mods(mods, buf)
            }
            FmlServerPacket::RegistryData {
                has_more,
                name,
                ids,
                substitutions,
                dummies,
            } => {
                Byte::write(&REGISTRY_DATA, buf)?;
                Boolean::write(has_more, buf)?;
                write_str(name, buf)?;
                VarInt::write(&(ids.len() as i32), buf)?;
                for (entry, id) in ids {
                    write_str(entry, buf)?;
                    VarInt::write(id, buf)?;
                }
                write_names(substitutions, buf)?;
                write_names(dummies, buf)
            }
            FmlServerPacket::ServerHandshakeAck { phase } => {
                Byte::write(&HANDSHAKE_ACK, buf)?;
                write_enum(*phase, buf)
            }
        }
    }
}

/// Client -> server handshake messages.
#[derive(Debug, Clone, PartialEq)]
pub enum FmlClientPacket {
    ClientHello { fml_protocol_version: i8 },
    ClientModList { mods: Vec<ModEntry> },
    ClientHandshakeAck { phase: ClientHandshakePhase },
}

impl FmlClientPacket {
    pub fn name(&self) -> &'static str {
        match self {
            FmlClientPacket::ClientHello { .. } => "FML|HS:ClientHello",
            FmlClientPacket::ClientModList { .. } => "FML|HS:ClientModList",
            FmlClientPacket::ClientHandshakeAck { .. } => "FML|HS:ClientHandshakeAck",
        }
    }
}

impl PacketEncode for FmlClientPacket {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        match self {
            FmlClientPacket::ClientHello {
                fml_protocol_version,
            } => {
                Byte::write(&CLIENT_HELLO, buf)?;
                Byte::write(fml_protocol_version, buf)
            }
            FmlClientPacket::ClientModList { mods } => {
                Byte::write(&MOD_LIST, buf)?;
                write_mods(mods, buf)
            }
            FmlClientPacket::ClientHandshakeAck { phase } => {
                Byte::write(&HANDSHAKE_ACK, buf)?;
                write_enum(*phase, buf)
            }
        }
    }
}

impl PacketDecode for FmlClientPacket {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        match Byte::read(buf)? {
            CLIENT_HELLO => Ok(FmlClientPacket::ClientHello {
                fml_protocol_version: Byte::read(buf)?,
            }),
            MOD_LIST => Ok(FmlClientPacket::ClientModList {
                mods: read_mods(buf)?,
            }),
            HANDSHAKE_ACK => Ok(FmlClientPacket::ClientHandshakeAck {
                phase: read_enum(buf)?,
            }),
            other => Err(ProtocolError::InvalidEnum {
                name: "FML|HS discriminator",
                value: other as i64,
            }),
        }
    }
}

/// Both halves of the handshake state for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmlHandshake {
    pub client: ClientHandshakePhase,
    pub server: ServerHandshakePhase,
}

impl Default for FmlHandshake {
    fn default() -> Self {
        Self {
            client: ClientHandshakePhase::Start,
            server: ServerHandshakePhase::Start,
        }
    }
}

impl FmlHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both sides reached their terminal phase.
    pub fn is_complete(&self) -> bool {
        self.client == ClientHandshakePhase::Complete
            && self.server == ServerHandshakePhase::Complete
    }

    /// Advance on a server message and return the replies to send, in order.
    pub fn advance(&mut self, packet: &FmlServerPacket, ctx: &Context) -> Vec<FmlClientPacket> {
        match packet {
            FmlServerPacket::ServerHello {
                fml_protocol_version,
                ..
            } => {
                self.server = ServerHandshakePhase::Hello;
                self.client = ClientHandshakePhase::Hello;
                vec![
                    FmlClientPacket::ClientHello {
                        fml_protocol_version: *fml_protocol_version,
                    },
                    FmlClientPacket::ClientModList {
                        mods: ctx.fml_mods.clone(),
                    },
                ]
            }
            FmlServerPacket::ServerModList { .. } => {
                self.ack(ClientHandshakePhase::WaitingServerData)
            }
            FmlServerPacket::RegistryData { has_more, .. } => {
                if *has_more {
                    Vec::new()
                } else {
                    self.ack(ClientHandshakePhase::WaitingServerComplete)
                }
            }
            FmlServerPacket::ServerHandshakeAck { phase } => {
                self.server = *phase;
                match phase {
                    ServerHandshakePhase::WaitingCAck => {
                        self.ack(ClientHandshakePhase::PendingComplete)
                    }
                    ServerHandshakePhase::Complete => self.ack(ClientHandshakePhase::Complete),
                    _ => Vec::new(),
                }
            }
        }
    }

    fn ack(&mut self, phase: ClientHandshakePhase) -> Vec<FmlClientPacket> {
        self.client = phase;
        vec![FmlClientPacket::ClientHandshakeAck { phase }]
    }
}
