//! A pure rust-implemented SOCKS5 proxy server (RFC 1928 / RFC 1929, CONNECT
//! only): greeting, optional username/password auth, request decoding,
//! origin connect, reply, and bidirectional relay with metering and
//! opportunistic credential sniffing, plus a side-channel monitor plane.
//!
//! `startup()` mirrors the teacher's `turn_server::startup` entry point
//! (`examples/mycrl-turn-rs/src/lib.rs`): a library function the binary and
//! integration tests both call, so tests can drive the real service without
//! spawning a separate process.

pub mod buffer;
pub mod config;
pub mod fsm;
pub mod metrics;
pub mod monitor;
pub mod proto;
pub mod relay;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod sniffers;
pub mod users;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use config::Config;
use metrics::Metrics;
use resolver::ResolverHandle;
use tokio::net::TcpListener;
use users::UserTable;

/// Process-wide root shared by every session and the monitor plane.
pub struct AppState {
    pub config: Config,
    pub users: UserTable,
    pub metrics: Arc<Metrics>,
    pub sniff_pop3: AtomicBool,
    pub sniff_http: AtomicBool,
    pub resolver: ResolverHandle,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let users = UserTable::new(config.users.capacity);
        for (name, password) in &config.users.initial {
            if let Err(e) = users.add(name.clone(), password.clone()) {
                log::warn!("skipping initial user {name:?}: {e:?}");
            }
        }

        let resolver = ResolverHandle::spawn(config.resolver_workers);
        let sniff_pop3 = AtomicBool::new(config.sniff.pop3);
        let sniff_http = AtomicBool::new(config.sniff.http);

        Self {
            config,
            users,
            metrics: Arc::new(Metrics::default()),
            sniff_pop3,
            sniff_http,
            resolver,
        }
    }
}

/// Binds both listening sockets and runs forever, handling SIGINT/SIGTERM
/// for an orderly shutdown (spec §5). Exposed as a library function so
/// integration tests can start the real service against ephemeral ports.
pub async fn startup(app: Arc<AppState>) -> anyhow::Result<()> {
    let socks5_listener = TcpListener::bind(app.config.socks5.listen).await?;
    let monitor_listener = TcpListener::bind(app.config.monitor.listen).await?;

    log::info!(
        "socks5-server listening: socks5={} monitor={}",
        socks5_listener.local_addr()?,
        monitor_listener.local_addr()?,
    );

    let monitor_app = app.clone();
    let monitor_task = tokio::spawn(monitor::serve(monitor_listener, monitor_app));

    let acceptor_app = app.clone();
    let acceptor_task = tokio::spawn(async move {
        loop {
            match socks5_listener.accept().await {
                Ok((stream, peer)) => {
                    let app = acceptor_app.clone();
                    tokio::spawn(session::run(stream, peer, app));
                }
                Err(e) => log::warn!("socks5 accept failed: {e}"),
            }
        }
    });

    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => log::info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => log::info!("received SIGTERM, shutting down"),
    }

    acceptor_task.abort();
    monitor_task.abort();
    Ok(())
}
