//! Status phase: server list query, latency ping and version probing.

use std::collections::BTreeSet;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::common::error::{ConnectionError, ConnectionResult, ProtocolResult};
use crate::protocol::context::{latest_protocol_version, Context};
use crate::protocol::packets::ids::StatusKind;
use crate::protocol::packets::status::{PingPong, ServerStatus, StatusClientbound};
use crate::protocol::packets::{Registry, Serverbound};
use crate::protocol::reactor::{Action, Event};

/// What the status exchange is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMode {
    /// Report the server status, optionally followed by a latency ping.
    Query { ping: bool },
    /// Pick the protocol version for a following login.
    Probe {
        allowed_versions: BTreeSet<i32>,
        default_version: i32,
    },
}

impl Default for StatusMode {
    fn default() -> Self {
        StatusMode::Query { ping: false }
    }
}

impl StatusMode {
    pub fn probe(allowed_versions: BTreeSet<i32>) -> Self {
        let default_version = allowed_versions
            .iter()
            .next_back()
            .copied()
            .unwrap_or_else(latest_protocol_version);
        StatusMode::Probe {
            allowed_versions,
            default_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReactor {
    packets: Registry<StatusKind>,
    mode: StatusMode,
}

impl StatusReactor {
    pub fn new(mode: StatusMode, ctx: &Context) -> Self {
        Self {
            packets: Registry::build(ctx),
            mode,
        }
    }

    pub fn mode(&self) -> &StatusMode {
        &self.mode
    }

    pub fn read_packet(&self, body: Bytes, ctx: &Context) -> ProtocolResult<StatusClientbound> {
        self.packets.decode(body, ctx)
    }

    pub fn react(
        &mut self,
        packet: StatusClientbound,
        ctx: &mut Context,
    ) -> ConnectionResult<Vec<Action>> {
        match packet {
            StatusClientbound::Response(response) => {
                let status = response.parse()?;
                match &self.mode {
                    StatusMode::Query { ping } => Ok(self.on_query_status(status, *ping)),
                    StatusMode::Probe { .. } => self.on_probe_status(status, ctx),
                }
            }
            StatusClientbound::Pong(pong) => Ok(self.on_pong(pong)),
            StatusClientbound::Raw(raw) => {
                debug!("Ignoring status packet 0x{:02X}", raw.id);
                Ok(Vec::new())
            }
        }
    }

    fn on_query_status(&self, status: ServerStatus, ping: bool) -> Vec<Action> {
        let next = if ping {
            Action::Send(Serverbound::Ping(PingPong {
                time: Utc::now().timestamp_millis(),
            }))
        } else {
            Action::Disconnect { immediate: false }
        };
        vec![next, Action::Report(Event::Status(status))]
    }

    fn on_pong(&self, pong: PingPong) -> Vec<Action> {
        match self.mode {
            StatusMode::Query { ping: true } => {
                let latency = Utc::now().timestamp_millis() - pong.time;
                debug!("Ping: {} ms", latency);
                vec![
                    Action::Disconnect { immediate: false },
                    Action::Report(Event::Latency(latency)),
                ]
            }
            _ => Vec::new(),
        }
    }

    fn on_probe_status(
        &self,
        status: ServerStatus,
        ctx: &mut Context,
    ) -> ConnectionResult<Vec<Action>> {
        let StatusMode::Probe {
            allowed_versions,
            default_version,
        } = &self.mode
        else {
            return Ok(Vec::new());
        };

        // Servers still starting up answer with an empty object; falling
        // back to the default version would be wrong there.
        if status.is_empty() {
            return Err(ConnectionError::InvalidServerStatus);
        }

        let mut actions = vec![Action::Disconnect { immediate: false }];

        let Some(protocol) = status.protocol() else {
            info!(
                "Server status has no protocol version, using default {}",
                default_version
            );
            actions.push(Action::Report(Event::ProtocolSelected(*default_version)));
            return Ok(actions);
        };

        if !allowed_versions.contains(&protocol) {
            warn!(
                "Server protocol {} ({}) is not allowed for this connection",
                protocol,
                status.version_name().unwrap_or("unknown")
            );
            actions.push(Action::Report(Event::VersionMismatch {
                server_protocol: Some(protocol),
                server_version: status.version_name().map(str::to_string),
            }));
            return Ok(actions);
        }

        if ctx.enable_fml && ctx.fml_mods.is_empty() {
            ctx.fml_mods = status.mods();
            debug!("Harvested {} mods from server status", ctx.fml_mods.len());
        }

        actions.push(Action::Report(Event::ProtocolSelected(protocol)));
        Ok(actions)
    }

    /// A probe treats a server hanging up mid-exchange as a server that
    /// cannot answer status queries, and falls back to the default version.
    pub fn absorb_error(&mut self, error: &ConnectionError, _ctx: &Context) -> Option<Vec<Action>> {
        match &self.mode {
            StatusMode::Probe {
                default_version, ..
            } if error.is_eof() => {
                warn!("Status probe ended early ({}), using default version", error);
                Some(vec![
                    Action::Disconnect { immediate: true },
                    Action::Report(Event::ProtocolSelected(*default_version)),
                ])
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::context::ModEntry;
    use crate::protocol::packets::status::StatusResponse;

    fn response(json: &str) -> StatusClientbound {
        StatusClientbound::Response(StatusResponse {
            json_response: json.to_string(),
        })
    }

    fn probe(allowed: &[i32]) -> StatusReactor {
        StatusReactor::new(
            StatusMode::probe(allowed.iter().copied().collect()),
            &Context::new(340),
        )
    }

    #[test]
    fn test_probe_selects_server_protocol_and_harvests_mods() {
        let mut ctx = Context::new(340).with_fml(Vec::new());
        let mut reactor = probe(&[340, 754]);

        let actions = reactor
            .react(
                response(
                    r#"{"version":{"protocol":340,"name":"1.12.2"},
                        "modinfo":{"modList":[{"modid":"forge","version":"14.23"}]}}"#,
                ),
                &mut ctx,
            )
            .unwrap();

        assert_eq!(
            actions,
            vec![
                Action::Disconnect { immediate: false },
                Action::Report(Event::ProtocolSelected(340))
            ]
        );
        assert_eq!(ctx.fml_mods, vec![ModEntry::new("forge", "14.23")]);
    }

    #[test]
    fn test_probe_without_protocol_uses_default() {
        let mut ctx = Context::new(340);
        let mut reactor = probe(&[340, 754]);
        let actions = reactor
            .react(response(r#"{"description":"hi"}"#), &mut ctx)
            .unwrap();
        assert_eq!(actions[1], Action::Report(Event::ProtocolSelected(754)));
    }

    #[test]
    fn test_probe_reports_version_mismatch() {
        let mut ctx = Context::new(340);
        let mut reactor = probe(&[340]);
        let actions = reactor
            .react(
                response(r#"{"version":{"protocol":754,"name":"1.16.5"}}"#),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            actions[1],
            Action::Report(Event::VersionMismatch {
                server_protocol: Some(754),
                server_version: Some("1.16.5".to_string()),
            })
        );
    }

    #[test]
    fn test_probe_rejects_empty_status() {
        let mut ctx = Context::new(340);
        let mut reactor = probe(&[340]);
        assert!(matches!(
            reactor.react(response("{}"), &mut ctx),
            Err(ConnectionError::InvalidServerStatus)
        ));
    }

    #[test]
    fn test_probe_absorbs_eof_only() {
        let ctx = Context::new(340);
        let mut reactor = probe(&[340, 754]);
        let absorbed = reactor
            .absorb_error(&ConnectionError::ConnectionClosed, &ctx)
            .unwrap();
        assert_eq!(absorbed[0], Action::Disconnect { immediate: true });
        assert_eq!(absorbed[1], Action::Report(Event::ProtocolSelected(754)));

        assert!(reactor
            .absorb_error(&ConnectionError::InvalidServerStatus, &ctx)
            .is_none());
    }

    #[test]
    fn test_query_with_ping_measures_latency() {
        let mut ctx = Context::new(340);
        let mut reactor = StatusReactor::new(StatusMode::Query { ping: true }, &ctx);

        let actions = reactor
            .react(response(r#"{"version":{"protocol":340}}"#), &mut ctx)
            .unwrap();
        let sent = match &actions[0] {
            Action::Send(Serverbound::Ping(ping)) => ping.clone(),
            other => panic!("expected ping, got {:?}", other),
        };

        let actions = reactor
            .react(StatusClientbound::Pong(sent), &mut ctx)
            .unwrap();
        assert_eq!(actions[0], Action::Disconnect { immediate: false });
        match actions[1] {
            Action::Report(Event::Latency(ms)) => assert!(ms >= 0),
            ref other => panic!("expected latency, got {:?}", other),
        }
    }
}
