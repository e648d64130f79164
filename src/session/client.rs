//! Client-side framing helpers: drive a `Buffer` + an incremental parser
//! against the socket until a complete message arrives (spec §4.D/§4.F).

use std::io;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::buffer::Buffer;
use crate::proto::{ProtoError, Status};

#[derive(Debug)]
pub enum ReadFramedError {
    Proto(ProtoError),
    Io(io::Error),
    /// The peer closed the connection before a complete message arrived.
    Eof,
}

impl std::fmt::Display for ReadFramedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadFramedError::Proto(e) => write!(f, "protocol error: {e}"),
            ReadFramedError::Io(e) => write!(f, "io error: {e}"),
            ReadFramedError::Eof => write!(f, "connection closed mid-message"),
        }
    }
}

/// Reads from `stream` into `buf`, re-trying `parse` on the readable span
/// after every read, until `parse` reports `Complete` or `Err`. `parse` must
/// be a plain function (no captured state) since it may be invoked many
/// times against a growing view of the same buffer.
pub async fn read_framed<T>(
    stream: &mut TcpStream,
    buf: &mut Buffer,
    parse: fn(&[u8]) -> Status<T>,
) -> Result<T, ReadFramedError> {
    loop {
        match parse(buf.read_slice()) {
            Status::Complete { value, consumed } => {
                buf.commit_read(consumed);
                return Ok(value);
            }
            Status::Err(e) => return Err(ReadFramedError::Proto(e)),
            Status::Incomplete => {}
        }

        let writable = buf.write_slice();
        if writable.is_empty() {
            return Err(ReadFramedError::Proto(ProtoError::Oversized));
        }

        let n = stream.read(writable).await.map_err(ReadFramedError::Io)?;
        if n == 0 {
            return Err(ReadFramedError::Eof);
        }
        buf.commit_write(n);
    }
}
