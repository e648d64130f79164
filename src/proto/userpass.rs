//! Username/password subnegotiation (RFC 1929), server role.
//!
//! Wire layout: `VER(1)=0x01 | ULEN(1) | UNAME(ULEN) | PLEN(1) | PASSWD(PLEN)`.

use super::{ProtoError, Status};

pub const VERSION: u8 = 0x01;

pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_FAILURE: u8 = 0x01;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub fn parse(input: &[u8]) -> Status<Credentials> {
    if input.is_empty() {
        return Status::Incomplete;
    }
    if input[0] != VERSION {
        return Status::Err(ProtoError::BadVersion);
    }
    if input.len() < 2 {
        return Status::Incomplete;
    }

    let ulen = input[1] as usize;
    let after_uname = 2 + ulen;
    if input.len() < after_uname {
        return Status::Incomplete;
    }
    if ulen == 0 {
        return Status::Err(ProtoError::ZeroLengthUsername);
    }

    if input.len() < after_uname + 1 {
        return Status::Incomplete;
    }
    let plen = input[after_uname] as usize;
    let after_passwd = after_uname + 1 + plen;
    if input.len() < after_passwd {
        return Status::Incomplete;
    }
    if input.len() > after_passwd {
        return Status::Err(ProtoError::TrailingBytes);
    }

    let username = String::from_utf8_lossy(&input[2..after_uname]).into_owned();
    let password = String::from_utf8_lossy(&input[after_uname + 1..after_passwd]).into_owned();

    Status::Complete {
        value: Credentials { username, password },
        consumed: after_passwd,
    }
}

pub fn encode_reply(status: u8) -> [u8; 2] {
    [VERSION, status]
}
