//! Bidirectional relay (spec §4.F "Bidirectional relay", component G).
//!
//! Grounded on `examples/original_source/src/tunnel/tunnel.c`'s half-close
//! discipline: each direction is shut down independently once its source
//! reaches EOF, and the whole tunnel ends only when both directions have
//! closed. `tokio::io::copy` does not expose per-chunk hooks for metering
//! and sniffing, so the loop is hand-rolled here the way the teacher's
//! `PacketForwarder` (`crates/service/src/forwarding.rs`) owns one staging
//! buffer per direction instead of delegating to a generic copy helper.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::metrics::Metrics;
use crate::sniffers::Captured;
use crate::sniffers::http::HttpSniffer;
use crate::sniffers::pop3::Pop3Sniffer;

const CHUNK_SIZE: usize = 16 * 1024;

/// Which credential sniffer, if any, observes the client→origin stream.
pub enum Sniffer {
    None,
    Pop3(Pop3Sniffer),
    Http(HttpSniffer),
}

impl Sniffer {
    fn feed(&mut self, chunk: &[u8]) {
        match self {
            Sniffer::None => {}
            Sniffer::Pop3(s) => s.feed(chunk),
            Sniffer::Http(s) => s.feed(chunk),
        }
    }

    fn captured(&self) -> Option<&Captured> {
        match self {
            Sniffer::None => None,
            Sniffer::Pop3(s) => s.captured(),
            Sniffer::Http(s) => s.captured(),
        }
    }

    fn proto_name(&self) -> &'static str {
        match self {
            Sniffer::None => "none",
            Sniffer::Pop3(_) => "pop3",
            Sniffer::Http(_) => "http",
        }
    }

    pub fn captured_username(&self) -> Option<&str> {
        self.captured().map(|c| c.username.as_str())
    }
}

/// Copies one direction until EOF or error, then shuts down the write half
/// so the peer observes the half-close. Feeds `sniffer` with every chunk
/// read, if present, and adds every byte copied to `meter`. `on_capture` is
/// invoked at most once, immediately when `sniffer` transitions from
/// uncaptured to captured (spec §4.H: "emits a captured-credential event"
/// at the moment of capture, not at tunnel close).
async fn pump(
    mut src: OwnedReadHalf,
    mut dst: OwnedWriteHalf,
    mut sniffer: Option<&mut Sniffer>,
    meter: impl Fn(u64),
    on_capture: impl Fn(&Sniffer, &Captured),
) -> std::io::Result<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if let Some(sniffer) = sniffer.as_deref_mut() {
            let already_captured = sniffer.captured().is_some();
            sniffer.feed(&buf[..n]);
            if !already_captured {
                if let Some(captured) = sniffer.captured() {
                    on_capture(sniffer, captured);
                }
            }
        }
        dst.write_all(&buf[..n]).await?;
        meter(n as u64);
    }
    // Half-close: tell the origin/client there is no more data coming this
    // way, without touching the other direction's pump.
    let _ = dst.shutdown().await;
    Ok(())
}

/// Runs both directions of the tunnel concurrently until each side has seen
/// EOF. Returns once the tunnel is fully closed in both directions. `peer`
/// and `target` identify the session for the credentials-log line (spec
/// §6: `SRC=ip DST=host:port`), emitted the instant the sniffer captures.
pub async fn relay(
    client: TcpStream,
    origin: TcpStream,
    metrics: Arc<Metrics>,
    mut client_to_origin_sniffer: Option<Sniffer>,
    peer: SocketAddr,
    target: SocketAddr,
) -> Option<Sniffer> {
    let (client_read, client_write) = client.into_split();
    let (origin_read, origin_write) = origin.into_split();

    let metrics_c2o = metrics.clone();
    let sniffer_ref = client_to_origin_sniffer.as_mut();
    let c2o = pump(
        client_read,
        origin_write,
        sniffer_ref,
        move |n| metrics_c2o.add_client_to_origin(n),
        move |sniffer, captured| {
            log::info!(
                target: "credentials",
                "proto={} src={} dst={} user={} pass={}",
                sniffer.proto_name(),
                peer.ip(),
                target,
                captured.username,
                captured.password,
            );
        },
    );

    let metrics_o2c = metrics.clone();
    let o2c = pump(
        origin_read,
        client_write,
        None,
        move |n| metrics_o2c.add_origin_to_client(n),
        |_, _| {},
    );

    let (c2o_result, o2c_result) = tokio::join!(c2o, o2c);
    if let Err(e) = c2o_result {
        log::debug!("client->origin relay ended: {e}");
    }
    if let Err(e) = o2c_result {
        log::debug!("origin->client relay ended: {e}");
    }

    client_to_origin_sniffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn relays_bytes_in_both_directions_and_meters_them() {
        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        let origin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin_addr = origin_listener.local_addr().unwrap();

        let client_peer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(client_addr).await.unwrap();
            stream.write_all(b"hello-origin").await.unwrap();
            stream.shutdown().await.unwrap();
            let mut response = Vec::new();
            stream.read_to_end(&mut response).await.unwrap();
            response
        });

        let origin_peer = tokio::spawn(async move {
            let (mut stream, _) = origin_listener.accept().await.unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).await.unwrap();
            stream.write_all(b"hello-client").await.unwrap();
            stream.shutdown().await.unwrap();
            request
        });

        let (client_side, _) = client_listener.accept().await.unwrap();
        let origin_side = TcpStream::connect(origin_addr).await.unwrap();

        let metrics = Arc::new(Metrics::default());
        relay(
            client_side,
            origin_side,
            metrics.clone(),
            None,
            client_addr,
            origin_addr,
        )
        .await;

        let request = origin_peer.await.unwrap();
        let response = client_peer.await.unwrap();
        assert_eq!(request, b"hello-origin");
        assert_eq!(response, b"hello-client");
        assert_eq!(
            metrics
                .bytes_client_to_origin
                .load(std::sync::atomic::Ordering::Relaxed),
            12
        );
        assert_eq!(
            metrics
                .bytes_origin_to_client
                .load(std::sync::atomic::Ordering::Relaxed),
            12
        );
    }

    #[tokio::test]
    async fn feeds_pop3_sniffer_from_client_to_origin_stream() {
        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        let origin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin_addr = origin_listener.local_addr().unwrap();

        let client_peer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(client_addr).await.unwrap();
            stream
                .write_all(b"USER alice\r\nPASS hunter2\r\n")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });

        let origin_peer = tokio::spawn(async move {
            let (mut stream, _) = origin_listener.accept().await.unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let (client_side, _) = client_listener.accept().await.unwrap();
        let origin_side = TcpStream::connect(origin_addr).await.unwrap();

        let metrics = Arc::new(Metrics::default());
        let sniffer = Some(Sniffer::Pop3(Pop3Sniffer::new()));
        let sniffer = relay(
            client_side,
            origin_side,
            metrics,
            sniffer,
            client_addr,
            origin_addr,
        )
        .await
        .unwrap();

        assert_eq!(sniffer.captured_username(), Some("alice"));
        client_peer.await.unwrap();
        origin_peer.await.unwrap();
    }
}
