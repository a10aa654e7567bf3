//! Connection driver.
//!
//! Owns the framed socket, the active reactor, the negotiated [`Context`]
//! and the outgoing queue. Each [`Connection::step`] flushes what is
//! queued, waits a bounded time for one packet, lets the reactor react and
//! carries out the resulting actions in order.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::auth::{AuthToken, SessionToken};
use crate::common::error::{AuthError, ConnectionError, ConnectionResult};
use crate::protocol::codec::{new_connection, MinecraftStream, TransportOptions};
use crate::protocol::context::Context;
use crate::protocol::packets::handshake::{Handshake, NextState};
use crate::protocol::packets::login::LoginStart;
use crate::protocol::packets::status::StatusRequest;
use crate::protocol::packets::{Phase, Serverbound};
use crate::protocol::reactor::{Action, Clientbound, Event, Reactor, StatusMode, StatusReactor};

/// How long a single read waits before reporting "nothing yet".
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Server silence after which the connection is considered dead.
pub const SILENCE_LIMIT: Duration = Duration::from_secs(30);

pub struct Connection<S, T = SessionToken> {
    stream: MinecraftStream<S>,
    reactor: Reactor,
    context: Context,
    auth_token: Option<T>,
    outgoing: VecDeque<Serverbound>,
    events: Vec<Event>,
    read_timeout: Duration,
    silence_limit: Duration,
    last_packet: Instant,
    spawned: bool,
    closed: bool,
}

impl<T: AuthToken> Connection<TcpStream, T> {
    /// Open a TCP connection to a game server.
    pub async fn connect(
        host: &str,
        port: u16,
        context: Context,
        auth_token: Option<T>,
    ) -> ConnectionResult<Self> {
        info!("Connecting to {}:{}", host, port);
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ConnectionError::ConnectFailed {
                host: host.to_string(),
                port,
                source,
            })?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, context, auth_token))
    }
}

impl<S, T> Connection<S, T>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: AuthToken,
{
    pub fn new(stream: S, context: Context, auth_token: Option<T>) -> Self {
        Self {
            stream: new_connection(stream),
            reactor: Reactor::handshake(&context),
            context,
            auth_token,
            outgoing: VecDeque::new(),
            events: Vec::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            silence_limit: SILENCE_LIMIT,
            last_packet: Instant::now(),
            spawned: false,
            closed: false,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_silence_limit(mut self, silence_limit: Duration) -> Self {
        self.silence_limit = silence_limit;
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub fn phase(&self) -> Phase {
        self.reactor.phase()
    }

    pub fn options(&self) -> TransportOptions {
        self.stream.codec().options()
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Events reported since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn queue_handshake(&mut self, host: &str, port: u16, next_state: NextState) {
        self.outgoing.push_back(Serverbound::Handshake(Handshake {
            protocol_version: self.context.protocol_version,
            server_address: host.to_string(),
            server_port: port,
            next_state,
        }));
    }

    /// Queue the status handshake and switch to a status reactor.
    pub fn start_status(&mut self, host: &str, port: u16, mode: StatusMode) {
        self.queue_handshake(host, port, NextState::Status);
        self.outgoing
            .push_back(Serverbound::StatusRequest(StatusRequest));
        self.reactor = Reactor::Status(StatusReactor::new(mode, &self.context));
    }

    /// Queue the login handshake and switch to the login reactor.
    pub fn start_login(&mut self, host: &str, port: u16, username: &str) {
        self.queue_handshake(host, port, NextState::Login);
        self.outgoing.push_back(Serverbound::LoginStart(LoginStart {
            name: username.to_string(),
        }));
        self.reactor = Reactor::for_phase(Phase::Login, &self.context);
    }

    /// Queue `packet`, or with `force` write it right away ahead of the
    /// queue.
    pub async fn write_packet(&mut self, packet: Serverbound, force: bool) -> ConnectionResult<()> {
        if self.closed {
            debug!("Dropping {} on a closed connection", packet.name());
            return Ok(());
        }
        if !force {
            self.outgoing.push_back(packet);
            return Ok(());
        }

        debug!("-> {} (forced)", packet.name());
        let body = packet.encode(&self.context)?;
        self.stream.send(body).await?;
        Ok(())
    }

    pub async fn flush_outgoing(&mut self) -> ConnectionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.drain_outgoing().await
    }

    async fn drain_outgoing(&mut self) -> ConnectionResult<()> {
        if self.outgoing.is_empty() {
            return Ok(());
        }
        while let Some(packet) = self.outgoing.pop_front() {
            debug!("-> {}", packet.name());
            let body = packet.encode(&self.context)?;
            self.stream.feed(body).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait up to `wait` for one packet. `Ok(None)` means nothing arrived.
    pub async fn read_packet(&mut self, wait: Duration) -> ConnectionResult<Option<Clientbound>> {
        let body = match timeout(wait, self.stream.next()).await {
            Err(_) => {
                if self.last_packet.elapsed() >= self.silence_limit {
                    return Err(ConnectionError::Timeout);
                }
                return Ok(None);
            }
            Ok(None) => return Err(ConnectionError::ConnectionClosed),
            Ok(Some(frame)) => frame?,
        };
        self.last_packet = Instant::now();
        Ok(Some(self.reactor.read_packet(body, &self.context)?))
    }

    /// Carry out reactor actions in order. A cooperative disconnect waits
    /// until the whole batch has run.
    pub async fn apply(&mut self, actions: Vec<Action>) -> ConnectionResult<()> {
        let mut close = false;
        for action in actions {
            match action {
                Action::Send(packet) => self.write_packet(packet, false).await?,
                Action::SendForced(packet) => self.write_packet(packet, true).await?,
                Action::JoinSession { server_hash } => self.join_session(&server_hash).await?,
                Action::EnableEncryption { shared_secret } => {
                    self.stream.codec_mut().enable_encryption(&shared_secret)?;
                    info!("Encryption enabled");
                }
                Action::EnableCompression { threshold } => {
                    self.stream.codec_mut().enable_compression(threshold);
                    info!("Compression enabled (threshold {})", threshold);
                }
                Action::Transition(phase) => {
                    info!("Entering {:?} phase", phase);
                    self.reactor = Reactor::for_phase(phase, &self.context);
                }
                Action::Disconnect { immediate: true } => self.disconnect(true).await,
                Action::Disconnect { immediate: false } => close = true,
                Action::Report(event) => self.report(event),
            }
        }
        if close {
            self.disconnect(false).await;
        }
        Ok(())
    }

    async fn join_session(&self, server_hash: &str) -> ConnectionResult<()> {
        let Some(token) = self.auth_token.as_ref() else {
            warn!("Server is in online mode but no access token is configured");
            return Ok(());
        };
        if !token.is_valid() {
            return Err(AuthError::TokenExpired.into());
        }
        token.join(server_hash).await?;
        info!("Joined session");
        Ok(())
    }

    fn report(&mut self, event: Event) {
        match event {
            Event::Spawned if self.spawned => return,
            Event::Spawned => {
                self.spawned = true;
                info!("Spawned in world");
            }
            Event::ProtocolSelected(version) => info!("Selected protocol version {}", version),
            ref other => debug!("Event: {:?}", other),
        }
        self.events.push(event);
    }

    /// Close the connection. Idempotent. A cooperative close flushes the
    /// queue first; an immediate one drops it.
    pub async fn disconnect(&mut self, immediate: bool) {
        if self.closed {
            return;
        }
        if immediate {
            self.outgoing.clear();
            if let Err(e) = self.stream.get_mut().shutdown().await {
                debug!("Shutdown failed: {}", e);
            }
        } else {
            if let Err(e) = self.drain_outgoing().await {
                debug!("Failed to flush before closing: {}", e);
            }
            if let Err(e) = self.stream.close().await {
                debug!("Close failed: {}", e);
            }
        }
        self.closed = true;
        info!("Disconnected");
    }

    async fn exchange(&mut self) -> ConnectionResult<()> {
        self.flush_outgoing().await?;
        if let Some(packet) = self.read_packet(self.read_timeout).await? {
            let actions = self.reactor.react(packet, &mut self.context)?;
            self.apply(actions).await?;
        }
        self.flush_outgoing().await
    }

    /// One round of flush, bounded read and reaction.
    pub async fn step(&mut self) -> ConnectionResult<()> {
        let Err(error) = self.exchange().await else {
            return Ok(());
        };

        if let Some(actions) = self.reactor.absorb_error(&error, &self.context) {
            warn!("Absorbed error in {:?} phase: {}", self.reactor.phase(), error);
            self.apply(actions).await?;
            self.disconnect(true).await;
            return Ok(());
        }

        self.disconnect(true).await;
        Err(error)
    }

    /// Drive the connection until it closes and return what was reported.
    pub async fn run(&mut self) -> ConnectionResult<Vec<Event>> {
        while !self.closed {
            self.step().await?;
        }
        Ok(self.take_events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    use bytes::{Bytes, BytesMut};
    use rsa::pkcs8::EncodePublicKey;
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
    use tokio::io::DuplexStream;
    use tokio_util::codec::{Encoder, Framed};
    use uuid::Uuid;

    use crate::protocol::buffer::PacketBuffer;
    use crate::protocol::codec::MinecraftCodec;
    use crate::protocol::packets::ids::{LoginKind, PlayKind, ServerboundKind};
    use crate::protocol::packets::login::{Disconnect, EncryptionRequest, EncryptionResponse, LoginSuccess};
    use crate::protocol::packets::play::{
        KeepAlive, PlayClientbound, PlayerPositionAndLook, TeleportConfirm,
    };
    use crate::protocol::packets::status::StatusResponse;
    use crate::protocol::packets::{encode_body, PacketDecode, PacketEncode, PacketKind};
    use crate::protocol::types::{VarInt, WireType};

    #[derive(Clone, Default)]
    struct RecordingToken {
        joins: Arc<Mutex<Vec<String>>>,
    }

    impl AuthToken for RecordingToken {
        fn is_valid(&self) -> bool {
            true
        }

        async fn join(&self, server_hash: &str) -> Result<(), AuthError> {
            self.joins.lock().unwrap().push(server_hash.to_string());
            Ok(())
        }
    }

    type Server = Framed<DuplexStream, MinecraftCodec>;

    fn pair(ctx: Context, token: Option<RecordingToken>) -> (Connection<DuplexStream, RecordingToken>, Server) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let connection =
            Connection::new(client, ctx, token).with_read_timeout(Duration::from_millis(20));
        (connection, Framed::new(server, MinecraftCodec::new()))
    }

    async fn recv(server: &mut Server) -> (i32, PacketBuffer) {
        let body = server.next().await.unwrap().unwrap();
        let mut buf = PacketBuffer::from(body);
        let id = VarInt::read(&mut buf).unwrap();
        (id, buf)
    }

    async fn send<P: PacketEncode>(server: &mut Server, id: i32, packet: &P, ctx: &Context) {
        server.send(encode_body(id, packet, ctx).unwrap()).await.unwrap();
    }

    fn login_success() -> LoginSuccess {
        LoginSuccess {
            uuid: Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap(),
            username: "Steve".to_string(),
        }
    }

    fn play_disconnect() -> Disconnect {
        Disconnect {
            json_data: r#"{"text":"bye"}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_then_keep_alive_echo() {
        let ctx = Context::new(754);
        let (mut connection, mut server) = pair(ctx.clone(), None);
        connection.start_login("localhost", 25565, "Steve");

        let script = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let (id, mut buf) = recv(&mut server).await;
                assert_eq!(id, 0x00);
                let handshake = Handshake::decode(&mut buf, &ctx).unwrap();
                assert_eq!(handshake.protocol_version, 754);
                assert_eq!(handshake.next_state, NextState::Login);

                let (id, mut buf) = recv(&mut server).await;
                assert_eq!(id, ServerboundKind::LoginStart.id(&ctx).unwrap());
                assert_eq!(LoginStart::decode(&mut buf, &ctx).unwrap().name, "Steve");

                let login = LoginKind::LoginSuccess.id(&ctx).unwrap();
                send(&mut server, login, &login_success(), &ctx).await;

                let keep_alive = PlayKind::KeepAlive.id(&ctx).unwrap();
                send(&mut server, keep_alive, &KeepAlive { keep_alive_id: 1234 }, &ctx).await;

                let (id, mut buf) = recv(&mut server).await;
                assert_eq!(id, ServerboundKind::KeepAlive.id(&ctx).unwrap());
                assert_eq!(KeepAlive::decode(&mut buf, &ctx).unwrap().keep_alive_id, 1234);

                let disconnect = PlayKind::Disconnect.id(&ctx).unwrap();
                send(&mut server, disconnect, &play_disconnect(), &ctx).await;
                server
            })
        };

        let events = connection.run().await.unwrap();
        script.await.unwrap();

        assert_eq!(connection.phase(), Phase::Play);
        assert!(connection.is_closed());
        assert_eq!(
            events,
            vec![
                Event::LoggedIn {
                    uuid: login_success().uuid,
                    username: "Steve".to_string(),
                },
                Event::Disconnected {
                    reason: "bye".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_login_success_swaps_in_play_reactor() {
        let ctx = Context::new(754);
        let (mut connection, mut server) = pair(ctx.clone(), None);
        connection.start_login("localhost", 25565, "Steve");
        connection.flush_outgoing().await.unwrap();
        recv(&mut server).await;
        recv(&mut server).await;
        assert_eq!(connection.phase(), Phase::Login);

        let login = LoginKind::LoginSuccess.id(&ctx).unwrap();
        send(&mut server, login, &login_success(), &ctx).await;
        connection.step().await.unwrap();
        assert_eq!(connection.phase(), Phase::Play);
        assert!(!connection.is_closed());
        assert!(!connection.is_spawned());

        // Login's set-compression id means nothing to the Play tables.
        let set_compression = LoginKind::SetCompression.id(&ctx).unwrap();
        server
            .send(Bytes::from_static(&[0x03, 0x80, 0x02]))
            .await
            .unwrap();
        match connection.read_packet(Duration::from_secs(1)).await.unwrap() {
            Some(Clientbound::Play(PlayClientbound::Raw(raw))) => {
                assert_eq!(raw.id, set_compression)
            }
            other => panic!("expected raw play packet, got {:?}", other),
        }
        assert!(!connection.options().compression_enabled);

        let position = PlayKind::PlayerPositionAndLook.id(&ctx).unwrap();
        let teleport = PlayerPositionAndLook {
            x: 0.5,
            y: 64.0,
            z: 0.5,
            yaw: 0.0,
            pitch: 0.0,
            flags: 0,
            teleport_id: Some(3),
        };
        send(&mut server, position, &teleport, &ctx).await;
        connection.step().await.unwrap();
        assert!(connection.is_spawned());

        let (id, mut buf) = recv(&mut server).await;
        assert_eq!(id, ServerboundKind::TeleportConfirm.id(&ctx).unwrap());
        assert_eq!(
            TeleportConfirm::decode(&mut buf, &ctx).unwrap(),
            TeleportConfirm { teleport_id: 3 }
        );
    }

    #[tokio::test]
    async fn test_encryption_boundary() {
        let ctx = Context::new(340);
        let token = RecordingToken::default();
        let joins = token.joins.clone();
        let (mut connection, mut server) = pair(ctx.clone(), Some(token));
        connection.start_login("localhost", 25565, "Steve");

        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let der = private.to_public_key().to_public_key_der().unwrap();

        let script = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                recv(&mut server).await;
                recv(&mut server).await;

                let request = EncryptionRequest {
                    server_id: String::new(),
                    public_key: der.as_bytes().to_vec(),
                    verify_token: vec![1, 2, 3, 4],
                };
                send(&mut server, LoginKind::EncryptionRequest.id(&ctx).unwrap(), &request, &ctx).await;

                // The response arrives in plaintext.
                let (id, mut buf) = recv(&mut server).await;
                assert_eq!(id, ServerboundKind::EncryptionResponse.id(&ctx).unwrap());
                let response = EncryptionResponse::decode(&mut buf, &ctx).unwrap();
                let token = private.decrypt(Pkcs1v15Encrypt, &response.verify_token).unwrap();
                assert_eq!(token, vec![1, 2, 3, 4]);
                let secret = private.decrypt(Pkcs1v15Encrypt, &response.shared_secret).unwrap();

                // Everything after it goes through the cipher.
                server.codec_mut().enable_encryption(&secret).unwrap();
                send(&mut server, LoginKind::LoginSuccess.id(&ctx).unwrap(), &login_success(), &ctx).await;
                let keep_alive = PlayKind::KeepAlive.id(&ctx).unwrap();
                send(&mut server, keep_alive, &KeepAlive { keep_alive_id: 99 }, &ctx).await;

                let (id, mut buf) = recv(&mut server).await;
                assert_eq!(id, ServerboundKind::KeepAlive.id(&ctx).unwrap());
                assert_eq!(KeepAlive::decode(&mut buf, &ctx).unwrap().keep_alive_id, 99);

                let disconnect = PlayKind::Disconnect.id(&ctx).unwrap();
                send(&mut server, disconnect, &play_disconnect(), &ctx).await;
                server
            })
        };

        let events = connection.run().await.unwrap();
        script.await.unwrap();

        assert_eq!(joins.lock().unwrap().len(), 1);
        assert!(events.iter().any(|e| matches!(e, Event::LoggedIn { .. })));
    }

    #[tokio::test]
    async fn test_login_rejection_surfaces() {
        let ctx = Context::new(340);
        let (mut connection, mut server) = pair(ctx.clone(), None);
        connection.start_login("localhost", 25565, "Steve");

        let script = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                recv(&mut server).await;
                recv(&mut server).await;
                let rejection = Disconnect {
                    json_data: r#"{"text":"Outdated server! I'm still on 1.12.2"}"#.to_string(),
                };
                send(&mut server, LoginKind::Disconnect.id(&ctx).unwrap(), &rejection, &ctx).await;
                server
            })
        };

        let result = connection.run().await;
        script.await.unwrap();

        match result {
            Err(ConnectionError::LoginRejected(rejection)) => {
                assert_eq!(rejection.server_version.as_deref(), Some("1.12.2"));
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_status_probe_selects_protocol() {
        let ctx = Context::new(754);
        let (mut connection, mut server) = pair(ctx.clone(), None);
        connection.start_status("localhost", 25565, StatusMode::probe(BTreeSet::from([340, 754])));

        let script = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let (_, mut buf) = recv(&mut server).await;
                assert_eq!(Handshake::decode(&mut buf, &ctx).unwrap().next_state, NextState::Status);
                let (id, _) = recv(&mut server).await;
                assert_eq!(id, ServerboundKind::StatusRequest.id(&ctx).unwrap());

                let response = StatusResponse {
                    json_response: r#"{"version":{"name":"1.12.2","protocol":340}}"#.to_string(),
                };
                send(&mut server, 0x00, &response, &ctx).await;
                server
            })
        };

        let events = connection.run().await.unwrap();
        script.await.unwrap();
        assert_eq!(events, vec![Event::ProtocolSelected(340)]);
    }

    #[tokio::test]
    async fn test_status_probe_absorbs_early_close() {
        let ctx = Context::new(754);
        let (mut connection, mut server) = pair(ctx.clone(), None);
        connection.start_status("localhost", 25565, StatusMode::probe(BTreeSet::from([47, 340])));

        let script = tokio::spawn(async move {
            recv(&mut server).await;
            recv(&mut server).await;
            drop(server);
        });

        let events = connection.run().await.unwrap();
        script.await.unwrap();
        assert_eq!(events, vec![Event::ProtocolSelected(340)]);
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let (connection, _server) = pair(Context::new(754), None);
        let mut connection = connection.with_silence_limit(Duration::from_millis(50));
        connection.start_login("localhost", 25565, "Steve");

        let result = connection.run().await;
        assert!(matches!(result, Err(ConnectionError::Timeout)));
    }

    #[tokio::test]
    async fn test_status_query_against_mock_stream() {
        let ctx = Context::new(754);

        // [len][id][VarInt 754]["localhost"][25565][next state 1], then the request.
        let mut expected = vec![0x10, 0x00, 0xF2, 0x05, 0x09];
        expected.extend_from_slice(b"localhost");
        expected.extend_from_slice(&[0x63, 0xDD, 0x01]);
        expected.extend_from_slice(&[0x01, 0x00]);

        let json = r#"{"version":{"name":"1.16.5","protocol":754},"description":{"text":"hi"}}"#;
        let body = encode_body(
            0x00,
            &StatusResponse {
                json_response: json.to_string(),
            },
            &ctx,
        )
        .unwrap();
        let mut response = BytesMut::new();
        MinecraftCodec::new()
            .encode(Bytes::clone(&body), &mut response)
            .unwrap();

        let mock = tokio_test::io::Builder::new()
            .write(&expected)
            .read(&response)
            .build();

        let mut connection: Connection<_, RecordingToken> = Connection::new(mock, ctx, None);
        connection.start_status("localhost", 25565, StatusMode::Query { ping: false });
        let events = connection.run().await.unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Status(status) => {
                assert_eq!(status.protocol(), Some(754));
                assert_eq!(status.version_name(), Some("1.16.5"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
