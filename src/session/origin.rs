//! Origin-side connect fallback (spec §4.F "Connect fallback policy").
//!
//! Grounded on `examples/original_source/src/connect/connect.c`'s sequential
//! probing of the resolver's candidate list: try each address in the order
//! the resolver returned it, keep the first that connects, and surface the
//! last error if every candidate fails. Tokio's `TcpStream::connect` future
//! resolving to `Err` stands in for the original's post-connect
//! `getsockopt(SO_ERROR)` probe.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::proto::reply;

/// Attempts each candidate in order; returns the first live connection plus
/// the address it connected to, or the last error if none succeeded.
pub async fn connect(candidates: &[SocketAddr]) -> Result<(TcpStream, SocketAddr), io::Error> {
    let mut last_err: Option<io::Error> = None;

    for &addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no candidate addresses to connect to")
    }))
}

/// Maps a failed connect attempt onto a SOCKS5 REP code (spec §7).
pub fn classify_connect_error(err: &io::Error) -> u8 {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => reply::REP_CONNECTION_REFUSED,
        io::ErrorKind::TimedOut | io::ErrorKind::HostUnreachable => reply::REP_HOST_UNREACHABLE,
        _ => reply::REP_GENERAL_FAILURE,
    }
}
