//! Integration tests driving the real service over loopback sockets,
//! grounded on `examples/mycrl-turn-rs/crates/service/tests/turn.rs`'s
//! "construct the real service, talk to it over a real socket" style.

use std::sync::Arc;

use socks5_server::config::Config;
use socks5_server::{AppState, monitor, session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn test_config() -> Config {
    toml::from_str("").unwrap()
}

/// Spawns a one-shot acceptor for the SOCKS5 plane: accepts exactly one
/// connection and runs a session to completion.
fn spawn_single_session(listener: TcpListener, app: Arc<AppState>) {
    tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        session::run(stream, peer, app).await;
    });
}

#[tokio::test]
async fn scenario_1_happy_path_connect_over_ipv4() {
    let origin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = origin_listener.local_addr().unwrap();
    let origin_task = tokio::spawn(async move {
        let (mut stream, _) = origin_listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        stream.write_all(b"world").await.unwrap();
    });

    let app = Arc::new(AppState::new(test_config()));
    let socks_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socks_addr = socks_listener.local_addr().unwrap();
    spawn_single_session(socks_listener, app.clone());

    let mut client = TcpStream::connect(socks_addr).await.unwrap();

    // Greeting: VER=5, NMETHODS=1, METHODS=[NO_AUTH]
    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    // CONNECT request to the real origin listener's loopback address.
    let Some(std::net::SocketAddr::V4(origin_v4)) = Some(origin_addr) else {
        panic!("expected IPv4 origin address");
    };
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&origin_v4.ip().octets());
    request.extend_from_slice(&origin_v4.port().to_be_bytes());
    client.write_all(&request).await.unwrap();

    let mut reply_header = [0u8; 4];
    client.read_exact(&mut reply_header).await.unwrap();
    assert_eq!(reply_header[0], 0x05);
    assert_eq!(reply_header[1], 0x00); // REP_SUCCESS
    assert_eq!(reply_header[3], 0x01); // ATYP_IPV4
    let mut reply_tail = [0u8; 6];
    client.read_exact(&mut reply_tail).await.unwrap();

    client.write_all(b"hello").await.unwrap();
    let mut response = [0u8; 5];
    client.read_exact(&mut response).await.unwrap();
    assert_eq!(&response, b"world");

    origin_task.await.unwrap();
    assert_eq!(
        app.metrics
            .total_connections
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn scenario_6_monitor_reset_then_adduser() {
    let app = Arc::new(AppState::new(test_config()));
    app.metrics.session_opened();

    let monitor_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let monitor_addr = monitor_listener.local_addr().unwrap();
    tokio::spawn(monitor::serve(monitor_listener, app.clone()));

    let mut reset_conn = TcpStream::connect(monitor_addr).await.unwrap();
    reset_conn.write_all(b"RESET\n").await.unwrap();
    reset_conn.shutdown().await.unwrap();
    let mut reset_reply = String::new();
    reset_conn.read_to_string(&mut reset_reply).await.unwrap();
    assert_eq!(reset_reply, "OK: metrics reset\n");

    let mut adduser_conn = TcpStream::connect(monitor_addr).await.unwrap();
    adduser_conn.write_all(b"ADDUSER bob secret\n").await.unwrap();
    adduser_conn.shutdown().await.unwrap();
    let mut adduser_reply = String::new();
    adduser_conn.read_to_string(&mut adduser_reply).await.unwrap();
    assert_eq!(adduser_reply, "OK: user added\n");
    assert!(app.users.verify("bob", "secret"));

    let mut snapshot_conn = TcpStream::connect(monitor_addr).await.unwrap();
    snapshot_conn.write_all(b"\n").await.unwrap();
    snapshot_conn.shutdown().await.unwrap();
    let mut snapshot = String::new();
    snapshot_conn.read_to_string(&mut snapshot).await.unwrap();
    assert!(snapshot.contains("total_connections: 0"));
    assert!(snapshot.ends_with("Reply Codes:\n"));
}

#[tokio::test]
async fn scenario_3_and_4_userpass_auth_outcomes() {
    let config = test_config();
    let app = Arc::new(AppState::new(config));
    app.users.add("alice".into(), "pw".into()).unwrap();

    let origin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = origin_listener.local_addr().unwrap();
    let origin_task = tokio::spawn(async move {
        let (mut stream, _) = origin_listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
    });

    let socks_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socks_addr = socks_listener.local_addr().unwrap();
    spawn_single_session(socks_listener, app.clone());

    let mut client = TcpStream::connect(socks_addr).await.unwrap();
    client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x02]);

    // VER=01 ULEN=5 "alice" PLEN=2 "pw"
    client
        .write_all(&[0x01, 0x05, b'a', b'l', b'i', b'c', b'e', 0x02, b'p', b'w'])
        .await
        .unwrap();
    let mut auth_reply = [0u8; 2];
    client.read_exact(&mut auth_reply).await.unwrap();
    assert_eq!(auth_reply, [0x01, 0x00]);

    let Some(std::net::SocketAddr::V4(origin_v4)) = Some(origin_addr) else {
        panic!("expected IPv4 origin address");
    };
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&origin_v4.ip().octets());
    request.extend_from_slice(&origin_v4.port().to_be_bytes());
    client.write_all(&request).await.unwrap();

    let mut reply_header = [0u8; 4];
    client.read_exact(&mut reply_header).await.unwrap();
    assert_eq!(reply_header[1], 0x00);
    client.shutdown().await.unwrap();

    origin_task.await.unwrap();
    assert_eq!(
        app.metrics.auth_ok.load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}
