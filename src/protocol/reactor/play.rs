//! Play phase: keep-alives, teleports, plugin channels and the Forge
//! mod-list handshake.

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::common::error::ProtocolResult;
use crate::protocol::context::Context;
use crate::protocol::packets::fml::FmlHandshake;
use crate::protocol::packets::ids::{PlayKind, TELEPORT_CONFIRM_SINCE};
use crate::protocol::packets::play::{
    KeepAlive, PlayClientbound, PlayerPositionAndLook, PositionAndLook, TeleportConfirm,
};
use crate::protocol::packets::plugins::{ChannelRegistry, PluginClientbound, PluginServerbound};
use crate::protocol::packets::{Registry, Serverbound};
use crate::protocol::reactor::login::disconnect_reason;
use crate::protocol::reactor::{Action, Event};

#[derive(Debug, Clone, PartialEq)]
pub struct PlayReactor {
    packets: Registry<PlayKind>,
    channels: ChannelRegistry,
    /// Forge handshake progress, present only when Forge is enabled.
    fml: Option<FmlHandshake>,
}

impl PlayReactor {
    pub fn new(ctx: &Context) -> Self {
        Self {
            packets: Registry::build(ctx),
            channels: ChannelRegistry::build(ctx),
            fml: ctx.enable_fml.then(FmlHandshake::new),
        }
    }

    pub fn fml_handshake(&self) -> Option<&FmlHandshake> {
        self.fml.as_ref()
    }

    /// Decode a packet; plugin messages on known channels come back as
    /// their sub-packet.
    pub fn read_packet(&self, body: Bytes, ctx: &Context) -> ProtocolResult<PlayClientbound> {
        match self.packets.decode(body, ctx)? {
            PlayClientbound::PluginMessage(message) => self.channels.resolve(message, ctx),
            packet => Ok(packet),
        }
    }

    pub fn react(&mut self, packet: PlayClientbound, ctx: &mut Context) -> Vec<Action> {
        match packet {
            PlayClientbound::SetCompression(set) => vec![Action::EnableCompression {
                threshold: set.threshold,
            }],
            PlayClientbound::KeepAlive(keep_alive) => {
                vec![Action::Send(Serverbound::KeepAlive(KeepAlive {
                    keep_alive_id: keep_alive.keep_alive_id,
                }))]
            }
            PlayClientbound::PlayerPositionAndLook(position) => {
                vec![
                    Action::Send(acknowledge_teleport(&position, ctx)),
                    Action::Report(Event::Spawned),
                ]
            }
            PlayClientbound::Disconnect(disconnect) => {
                let reason = disconnect_reason(&disconnect.json_data);
                info!("Disconnected by server: {}", reason);
                vec![
                    Action::Disconnect { immediate: false },
                    Action::Report(Event::Disconnected { reason }),
                ]
            }
            PlayClientbound::Plugin(plugin) => self.on_plugin(plugin, ctx),
            PlayClientbound::PluginMessage(message) => {
                debug!(
                    "Plugin message on unregistered channel {} ({} bytes)",
                    message.channel,
                    message.data.len()
                );
                Vec::new()
            }
            PlayClientbound::Raw(raw) => {
                trace!("Unhandled play packet 0x{:02X}", raw.id);
                Vec::new()
            }
        }
    }

    fn on_plugin(&mut self, plugin: PluginClientbound, ctx: &mut Context) -> Vec<Action> {
        debug!("Plugin packet {}", plugin.name());
        match plugin {
            PluginClientbound::Register(list) => {
                ctx.registered_channels.extend(list.channels.iter().cloned());
                vec![Action::Send(Serverbound::Plugin(PluginServerbound::Register(
                    list,
                )))]
            }
            PluginClientbound::Unregister(list) => {
                for channel in &list.channels {
                    ctx.registered_channels.remove(channel);
                }
                vec![Action::Send(Serverbound::Plugin(
                    PluginServerbound::Unregister(list),
                ))]
            }
            PluginClientbound::Fml(packet) => {
                let Some(handshake) = self.fml.as_mut() else {
                    return Vec::new();
                };
                let replies = handshake.advance(&packet, ctx);
                if handshake.is_complete() {
                    info!("Forge handshake complete");
                }
                replies
                    .into_iter()
                    .map(|reply| Action::Send(Serverbound::Plugin(PluginServerbound::Fml(reply))))
                    .collect()
            }
        }
    }
}

/// Teleport confirmation from 1.9 on, a full position echo before.
fn acknowledge_teleport(position: &PlayerPositionAndLook, ctx: &Context) -> Serverbound {
    match position.teleport_id {
        Some(teleport_id) if ctx.protocol_later_eq(TELEPORT_CONFIRM_SINCE) => {
            Serverbound::TeleportConfirm(TeleportConfirm { teleport_id })
        }
        _ => Serverbound::PositionAndLook(PositionAndLook {
            x: position.x,
            feet_y: position.y,
            z: position.z,
            yaw: position.yaw,
            pitch: position.pitch,
            on_ground: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::context::ModEntry;
    use crate::protocol::packets::fml::{FmlClientPacket, FmlServerPacket};
    use crate::protocol::packets::login::Disconnect;
    use crate::protocol::packets::plugins::ChannelList;

    fn position(teleport_id: Option<i32>) -> PlayClientbound {
        PlayClientbound::PlayerPositionAndLook(PlayerPositionAndLook {
            x: 10.5,
            y: 70.0,
            z: -4.5,
            yaw: 180.0,
            pitch: 12.5,
            flags: 0,
            teleport_id,
        })
    }

    #[test]
    fn test_keep_alive_echoed_once() {
        let mut ctx = Context::new(340);
        let mut reactor = PlayReactor::new(&ctx);
        let before = ctx.clone();

        let actions = reactor.react(
            PlayClientbound::KeepAlive(KeepAlive {
                keep_alive_id: 1234,
            }),
            &mut ctx,
        );

        assert_eq!(
            actions,
            vec![Action::Send(Serverbound::KeepAlive(KeepAlive {
                keep_alive_id: 1234
            }))]
        );
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_keep_alive_decoded_from_wire() {
        let ctx = Context::new(754);
        let reactor = PlayReactor::new(&ctx);
        let body = Bytes::from_static(&[0x1F, 0, 0, 0, 0, 0, 0, 0x04, 0xD2]);
        assert_eq!(
            reactor.read_packet(body, &ctx).unwrap(),
            PlayClientbound::KeepAlive(KeepAlive {
                keep_alive_id: 1234
            })
        );
    }

    #[test]
    fn test_teleport_acknowledgement_by_version() {
        let mut modern = Context::new(340);
        let mut reactor = PlayReactor::new(&modern);
        let actions = reactor.react(position(Some(9)), &mut modern);
        assert_eq!(
            actions,
            vec![
                Action::Send(Serverbound::TeleportConfirm(TeleportConfirm {
                    teleport_id: 9
                })),
                Action::Report(Event::Spawned),
            ]
        );

        let mut legacy = Context::new(47);
        let mut reactor = PlayReactor::new(&legacy);
        let actions = reactor.react(position(None), &mut legacy);
        match &actions[0] {
            Action::Send(Serverbound::PositionAndLook(echo)) => {
                assert_eq!(echo.feet_y, 70.0);
                assert_eq!(echo.pitch, 12.5);
                assert!(echo.on_ground);
            }
            other => panic!("expected position echo, got {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_is_terminal() {
        let mut ctx = Context::new(754);
        let mut reactor = PlayReactor::new(&ctx);
        let actions = reactor.react(
            PlayClientbound::Disconnect(Disconnect {
                json_data: r#"{"text":"Kicked"}"#.to_string(),
            }),
            &mut ctx,
        );
        assert_eq!(actions[0], Action::Disconnect { immediate: false });
        assert_eq!(
            actions[1],
            Action::Report(Event::Disconnected {
                reason: "Kicked".to_string()
            })
        );
    }

    #[test]
    fn test_register_tracks_channels() {
        let mut ctx = Context::new(754);
        let mut reactor = PlayReactor::new(&ctx);

        let list = ChannelList::new(["a:b", "c:d"]);
        let actions = reactor.react(
            PlayClientbound::Plugin(PluginClientbound::Register(list.clone())),
            &mut ctx,
        );
        assert_eq!(
            actions,
            vec![Action::Send(Serverbound::Plugin(PluginServerbound::Register(
                list
            )))]
        );
        assert!(ctx.registered_channels.contains("a:b"));

        reactor.react(
            PlayClientbound::Plugin(PluginClientbound::Unregister(ChannelList::new(["a:b"]))),
            &mut ctx,
        );
        assert!(!ctx.registered_channels.contains("a:b"));
        assert!(ctx.registered_channels.contains("c:d"));
    }

    #[test]
    fn test_server_hello_yields_hello_then_mod_list() {
        let mods = vec![
            ModEntry::new("forge", "14.23.5.2847"),
            ModEntry::new("jei", "4.16.1"),
        ];
        let mut ctx = Context::new(340).with_fml(mods.clone());
        let mut reactor = PlayReactor::new(&ctx);

        // FML|HS ServerHello, protocol 2, override dimension 7.
        let mut data = vec![0x00, 0x02];
        data.extend_from_slice(&7i32.to_be_bytes());
        let mut body = vec![0x18, 0x06];
        body.extend_from_slice(b"FML|HS");
        body.extend_from_slice(&data);

        let packet = reactor.read_packet(Bytes::from(body), &ctx).unwrap();
        assert_eq!(
            packet,
            PlayClientbound::Plugin(PluginClientbound::Fml(FmlServerPacket::ServerHello {
                fml_protocol_version: 2,
                override_dimension: Some(7),
            }))
        );

        let actions = reactor.react(packet, &mut ctx);
        assert_eq!(
            actions,
            vec![
                Action::Send(Serverbound::Plugin(PluginServerbound::Fml(
                    FmlClientPacket::ClientHello {
                        fml_protocol_version: 2
                    }
                ))),
                Action::Send(Serverbound::Plugin(PluginServerbound::Fml(
                    FmlClientPacket::ClientModList { mods }
                ))),
            ]
        );
    }

    #[test]
    fn test_fml_channel_raw_without_forge() {
        let ctx = Context::new(340);
        let reactor = PlayReactor::new(&ctx);
        let mut body = vec![0x18, 0x06];
        body.extend_from_slice(b"FML|HS");
        body.extend_from_slice(&[0x00, 0x01]);
        match reactor.read_packet(Bytes::from(body), &ctx).unwrap() {
            PlayClientbound::PluginMessage(message) => assert_eq!(message.channel, "FML|HS"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(reactor.fml_handshake().is_none());
    }
}
