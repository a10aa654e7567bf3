//! Login phase: encryption, compression, plugin requests and rejection.

use std::sync::LazyLock;

use bytes::Bytes;
use fancy_regex::Regex;
use tracing::{debug, info, warn};

use crate::common::error::{ConnectionResult, LoginRejection, ProtocolResult};
use crate::protocol::context::Context;
use crate::protocol::encryption::{
    encrypt_token_and_secret, generate_shared_secret, generate_verification_hash,
};
use crate::protocol::packets::ids::LoginKind;
use crate::protocol::packets::login::{
    EncryptionRequest, EncryptionResponse, LoginClientbound, LoginPluginResponse,
};
use crate::protocol::packets::{Phase, Registry, Serverbound};
use crate::protocol::reactor::{Action, Event};

static OUTDATED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Outdated (client! Please use|server! I'm still on) (?P<ver>\S+)$")
        .expect("outdated pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReactor {
    packets: Registry<LoginKind>,
}

impl LoginReactor {
    pub fn new(ctx: &Context) -> Self {
        Self {
            packets: Registry::build(ctx),
        }
    }

    pub fn read_packet(&self, body: Bytes, ctx: &Context) -> ProtocolResult<LoginClientbound> {
        self.packets.decode(body, ctx)
    }

    pub fn react(
        &mut self,
        packet: LoginClientbound,
        _ctx: &mut Context,
    ) -> ConnectionResult<Vec<Action>> {
        match packet {
            LoginClientbound::EncryptionRequest(request) => Ok(self.on_encryption_request(request)?),
            LoginClientbound::Disconnect(disconnect) => {
                Err(login_rejection(&disconnect.json_data).into())
            }
            LoginClientbound::LoginSuccess(success) => {
                info!("Logged in as {} ({})", success.username, success.uuid);
                Ok(vec![
                    Action::Report(Event::LoggedIn {
                        uuid: success.uuid,
                        username: success.username,
                    }),
                    Action::Transition(Phase::Play),
                ])
            }
            LoginClientbound::SetCompression(set) => Ok(vec![Action::EnableCompression {
                threshold: set.threshold,
            }]),
            LoginClientbound::PluginRequest(request) => {
                debug!(
                    "Declining login plugin request {} on {}",
                    request.message_id, request.channel
                );
                Ok(vec![Action::Send(Serverbound::LoginPluginResponse(
                    LoginPluginResponse::decline(request.message_id),
                ))])
            }
            LoginClientbound::Raw(raw) => {
                debug!("Ignoring login packet 0x{:02X}", raw.id);
                Ok(Vec::new())
            }
        }
    }

    fn on_encryption_request(&self, request: EncryptionRequest) -> ProtocolResult<Vec<Action>> {
        let secret = generate_shared_secret();
        let (verify_token, shared_secret) =
            encrypt_token_and_secret(&request.public_key, &request.verify_token, &secret)?;

        let mut actions = Vec::with_capacity(3);
        if request.is_online_mode() {
            let server_hash =
                generate_verification_hash(&request.server_id, &secret, &request.public_key);
            actions.push(Action::JoinSession { server_hash });
        }

        // The response must leave in plaintext, before the cipher is armed.
        actions.push(Action::SendForced(Serverbound::EncryptionResponse(
            EncryptionResponse {
                shared_secret,
                verify_token,
            },
        )));
        actions.push(Action::EnableEncryption {
            shared_secret: secret.to_vec(),
        });
        Ok(actions)
    }
}

/// Build the rejection for a login disconnect, spotting version mismatches.
pub fn login_rejection(json_data: &str) -> LoginRejection {
    let reason = disconnect_reason(json_data);
    let server_version = match OUTDATED_PATTERN.captures(&reason) {
        Ok(caps) => caps.and_then(|caps| caps.name("ver").map(|m| m.as_str().to_string())),
        Err(e) => {
            warn!("Could not match disconnect reason: {}", e);
            None
        }
    };

    if let Some(version) = &server_version {
        warn!("Server reports version mismatch, it runs {}", version);
    }
    LoginRejection {
        reason,
        server_version,
    }
}

/// Plain text of a chat component, falling back to the raw payload.
pub fn disconnect_reason(json_data: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(json_data) {
        Ok(serde_json::Value::Object(map)) => map
            .get("text")
            .and_then(|text| text.as_str())
            .unwrap_or_default()
            .to_string(),
        Ok(serde_json::Value::String(text)) => text,
        _ => json_data.to_string(),
    }
}
