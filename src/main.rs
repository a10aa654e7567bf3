//! Minecart - headless Minecraft Java Edition client.
//!
//! Probes the configured server for its protocol version, logs in and stays
//! connected, reconnecting with backoff whenever the connection ends.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{anyhow, Result};
use backon::BackoffBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use minecart::auth::SessionToken;
use minecart::client::Connection;
use minecart::common::ConnectionError;
use minecart::config::env::{check_empty_env_vars, get_config_path};
use minecart::config::{load_and_validate, Config};
use minecart::protocol::context::{is_supported, latest_protocol_version, protocol_for_release};
use minecart::protocol::{Context, Event};
use minecart::protocol::reactor::StatusMode;

/// How a single connect-and-play attempt ended.
#[derive(Debug)]
enum Outcome {
    /// The session ran and the connection closed.
    Finished,
    /// The server wants another protocol version.
    VersionMismatch(i32),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Minecart v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    for var in check_empty_env_vars() {
        warn!("{} is set but empty", var);
    }

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Server: {}:{}", config.server.host, config.server.port);
    info!("  Username: {}", config.account.username);
    info!("  Forge: {}", config.forge.enabled);

    let mut token = SessionToken::from_config(&config.account);
    match token.as_mut() {
        Some(token) => {
            if let Err(e) = token.resolve_profile_id().await {
                warn!("Could not resolve the player profile: {}", e);
            }
        }
        None => info!("No access token configured, only offline-mode servers will accept us"),
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed: {}", e);
        }
    });

    let mut allowed_versions = config.allowed_versions();
    let mut backoff = reconnect_backoff();

    loop {
        let outcome = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received");
                break;
            }
            outcome = play_session(&config, &allowed_versions, token.clone()) => outcome,
        };

        match outcome {
            Ok(Outcome::Finished) => {
                info!("Connection ended");
                backoff = reconnect_backoff();
            }
            Ok(Outcome::VersionMismatch(version)) => {
                warn!("Server expects protocol {}, retrying with it", version);
                allowed_versions = BTreeSet::from([version]);
            }
            Err(e) => error!("Session failed: {}", e),
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(60));
        info!("Reconnecting in {:.1} seconds...", delay.as_secs_f64());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {},
            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received during backoff");
                break;
            }
        }
    }

    info!("Exiting...");
    Ok(())
}

/// 1s initial, 60s max, doubling, with jitter, unlimited retries.
fn reconnect_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(60))
        .with_factor(2.0)
        .with_jitter()
        .without_max_times()
        .build()
}

fn base_context(config: &Config, protocol_version: i32) -> Context {
    let context = Context::new(protocol_version);
    if config.forge.enabled {
        context.with_fml(config.mods())
    } else {
        context
    }
}

/// Probe for a protocol version unless one is pinned, then log in and play
/// until the connection closes.
async fn play_session(
    config: &Config,
    allowed_versions: &BTreeSet<i32>,
    token: Option<SessionToken>,
) -> Result<Outcome> {
    let host = config.server.host.as_str();
    let port = config.server.port;
    let default_version = allowed_versions
        .last()
        .copied()
        .unwrap_or_else(latest_protocol_version);

    let mut context = base_context(config, default_version);

    if config.protocol.version.is_none() {
        let mut probe: Connection<_, SessionToken> =
            Connection::connect(host, port, context, None).await?;
        probe.start_status(host, port, StatusMode::probe(allowed_versions.clone()));
        let events = probe.run().await?;
        context = probe.into_context();

        for event in events {
            match event {
                Event::ProtocolSelected(version) => context.protocol_version = version,
                Event::VersionMismatch {
                    server_protocol,
                    server_version,
                } => {
                    return server_protocol
                        .filter(|protocol| is_supported(*protocol))
                        .or_else(|| server_version.as_deref().and_then(protocol_for_release))
                        .map(Outcome::VersionMismatch)
                        .ok_or_else(|| {
                            anyhow!("Server runs an unsupported version {:?}", server_version)
                        });
                }
                _ => {}
            }
        }
    }

    info!("Logging in with protocol {}", context.protocol_version);
    let mut connection = Connection::connect(host, port, context, token)
        .await?
        .with_read_timeout(config.read_timeout());
    connection.start_login(host, port, &config.account.username);

    match connection.run().await {
        Ok(events) => {
            for event in events {
                if let Event::LoggedIn { uuid, username } = event {
                    debug!("Session was for {} ({})", username, uuid);
                }
            }
            Ok(Outcome::Finished)
        }
        Err(ConnectionError::LoginRejected(rejection)) => {
            match rejection
                .server_version
                .as_deref()
                .and_then(protocol_for_release)
            {
                Some(version) => Ok(Outcome::VersionMismatch(version)),
                None => Err(rejection.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
