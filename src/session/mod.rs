//! Per-connection session core (spec §4.F, component F).
//!
//! Grounded on `examples/original_source/src/socks5_server/socks5_server.c`
//! for the state inventory (greeting → auth → request → connect → reply →
//! tunnel) and on the teacher's `Observer` callback style (`src/observer.rs`)
//! for reporting lifecycle events through `log` rather than the session
//! owning its own output sink.

pub mod client;
pub mod origin;

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::AppState;
use crate::buffer::Buffer;
use crate::fsm::{State, Terminal, transition};
use crate::proto::request::{Address, RequestError};
use crate::proto::{greeting, reply, request, userpass};
use crate::relay::{self, Sniffer};
use crate::sniffers::http::HttpSniffer;
use crate::sniffers::pop3::Pop3Sniffer;

/// Client-side sub-machine states (spec §4.F table). The origin side never
/// progresses independently in this implementation — the session is one
/// straight-line async task, not two concurrently scheduled sub-machines,
/// so "connect"/"connecting" exist here only as client-observable waits,
/// not as a separate driven state (see DESIGN.md's §4.F note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    HelloRead,
    HelloWrite,
    AuthRead,
    AuthWrite,
    RequestRead,
    RequestWrite,
    Reply,
    Tunnel,
    Done,
    Error,
}

impl Terminal for ClientState {
    fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Done | ClientState::Error)
    }
}

/// Context threaded through every `fsm::State` hook for this session.
struct SessionCtx {
    peer: SocketAddr,
}

impl State<SessionCtx> for ClientState {
    type Next = ClientState;

    fn on_arrival(&mut self, ctx: &mut SessionCtx) {
        log::debug!(target: "access", "peer={} client_state={:?}", ctx.peer, self);
    }
}

#[derive(Debug)]
pub enum SessionError {
    Framing(client::ReadFramedError),
    NoAcceptableMethod,
    AuthFailed,
    Request(RequestError),
    Connect(std::io::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Framing(e) => write!(f, "{e}"),
            SessionError::NoAcceptableMethod => write!(f, "no acceptable auth method"),
            SessionError::AuthFailed => write!(f, "authentication failed"),
            SessionError::Request(e) => write!(f, "request rejected: {e:?}"),
            SessionError::Connect(e) => write!(f, "origin connect failed: {e}"),
            SessionError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl From<client::ReadFramedError> for SessionError {
    fn from(e: client::ReadFramedError) -> Self {
        SessionError::Framing(e)
    }
}

fn zero_bound() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0)
}

/// Picks the credential sniffer, if any, that should observe this session's
/// client→origin stream, per the destination port and the monitor's live
/// toggles (spec §9 Open Question resolution: port list is a config knob,
/// `SNIFF` only toggles activation).
fn sniffer_for_port(port: u16, app: &AppState) -> Option<Sniffer> {
    if app.sniff_pop3.load(Ordering::Relaxed) && app.config.sniff_ports.pop3.contains(&port) {
        return Some(Sniffer::Pop3(Pop3Sniffer::new()));
    }
    if app.sniff_http.load(Ordering::Relaxed) && app.config.sniff_ports.http.contains(&port) {
        return Some(Sniffer::Http(HttpSniffer::new()));
    }
    None
}



/// Entry point for one accepted client connection. Never panics on
/// attacker-controlled input; every failure path is logged and the
/// connection closed.
pub async fn run(client: TcpStream, peer: SocketAddr, app: std::sync::Arc<AppState>) {
    app.metrics.session_opened();
    log::info!(target: "access", "peer={peer} event=accepted");

    match drive(client, peer, &app).await {
        Ok(()) => log::info!(target: "access", "peer={peer} event=closed"),
        Err(e) => log::warn!(target: "access", "peer={peer} event=closed reason=\"{e}\""),
    }

    app.metrics.session_closed();
}

async fn drive(mut client: TcpStream, peer: SocketAddr, app: &AppState) -> Result<(), SessionError> {
    let mut buf = Buffer::with_capacity(app.config.buffer_capacity);
    let mut ctx = SessionCtx { peer };

    let mut client_state = ClientState::HelloRead;
    client_state.on_arrival(&mut ctx);
    let greeting = client::read_framed(&mut client, &mut buf, greeting::parse).await?;
    let method = greeting::select_method(&greeting.methods, !app.users.is_empty());
    client_state = transition(&mut ctx, client_state, ClientState::HelloWrite);
    client
        .write_all(&greeting::encode_selection(method))
        .await
        .map_err(SessionError::Io)?;

    if method == greeting::METHOD_NO_ACCEPTABLE {
        transition(&mut ctx, client_state, ClientState::Error);
        return Err(SessionError::NoAcceptableMethod);
    }

    let mut username = None;
    if method == greeting::METHOD_USERPASS {
        client_state = transition(&mut ctx, client_state, ClientState::AuthRead);
        let creds = client::read_framed(&mut client, &mut buf, userpass::parse).await?;
        let ok = app.users.verify(&creds.username, &creds.password);
        app.metrics.record_auth(ok);

        let status = if ok {
            userpass::STATUS_SUCCESS
        } else {
            userpass::STATUS_FAILURE
        };
        client
            .write_all(&userpass::encode_reply(status))
            .await
            .map_err(SessionError::Io)?;

        if !ok {
            transition(&mut ctx, client_state, ClientState::Error);
            return Err(SessionError::AuthFailed);
        }
        username = Some(creds.username);
    }

    client_state = transition(&mut ctx, client_state, ClientState::RequestRead);
    let request_outcome = client::read_framed(&mut client, &mut buf, request::parse).await?;
    let parsed_request = match request_outcome {
        Ok(req) => req,
        Err(req_err) => {
            let rep = match req_err {
                RequestError::UnsupportedCommand => reply::REP_COMMAND_NOT_SUPPORTED,
                RequestError::UnsupportedAddressType => reply::REP_ADDRESS_TYPE_NOT_SUPPORTED,
            };
            app.metrics.record_reply(rep);
            let _ = client.write_all(&reply::encode(rep, zero_bound())).await;
            return Err(SessionError::Request(req_err));
        }
    };

    let candidates = match &parsed_request.address {
        Address::Ipv4(ip) => vec![SocketAddr::new(IpAddr::V4(*ip), parsed_request.port)],
        Address::Ipv6(ip) => vec![SocketAddr::new(IpAddr::V6(*ip), parsed_request.port)],
        Address::Domain(domain) => {
            match app.resolver.resolve(domain.clone(), parsed_request.port).await {
                Ok(addrs) => {
                    app.metrics.record_dns(true);
                    addrs
                }
                Err(e) => {
                    app.metrics.record_dns(false);
                    app.metrics.record_reply(reply::REP_HOST_UNREACHABLE);
                    let _ = client
                        .write_all(&reply::encode(reply::REP_HOST_UNREACHABLE, zero_bound()))
                        .await;
                    return Err(SessionError::Connect(e));
                }
            }
        }
    };

    let (origin_stream, connected_addr) = match origin::connect(&candidates).await {
        Ok(pair) => pair,
        Err(e) => {
            let rep = origin::classify_connect_error(&e);
            app.metrics.record_reply(rep);
            let _ = client.write_all(&reply::encode(rep, zero_bound())).await;
            return Err(SessionError::Connect(e));
        }
    };

    let local_addr = origin_stream.local_addr().map_err(SessionError::Io)?;
    app.metrics.record_reply(reply::REP_SUCCESS);
    client_state = transition(&mut ctx, client_state, ClientState::Reply);
    client
        .write_all(&reply::encode(reply::REP_SUCCESS, local_addr))
        .await
        .map_err(SessionError::Io)?;

    log::info!(
        target: "access",
        "peer={peer} user={username:?} target={connected_addr} event=connected"
    );

    client_state = transition(&mut ctx, client_state, ClientState::Tunnel);
    let sniffer = sniffer_for_port(parsed_request.port, app);
    relay::relay(
        client,
        origin_stream,
        app.metrics.clone(),
        sniffer,
        peer,
        connected_addr,
    )
    .await;
    transition(&mut ctx, client_state, ClientState::Done);

    Ok(())
}
