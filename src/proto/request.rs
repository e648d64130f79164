//! SOCKS5 CONNECT request (RFC 1928 §4), server role.
//!
//! Wire layout: `VER(1)=0x05 | CMD(1) | RSV(1)=0x00 | ATYP(1) | DSTADDR |
//! DSTPORT(2)`.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::{ProtoError, Status};

pub const VERSION: u8 = 0x05;

pub const CMD_CONNECT: u8 = 0x01;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Address {
    Ipv4(Ipv4Addr),
    Domain(String),
    Ipv6(Ipv6Addr),
}

impl Address {
    pub fn atyp(&self) -> u8 {
        match self {
            Address::Ipv4(_) => ATYP_IPV4,
            Address::Domain(_) => ATYP_DOMAIN,
            Address::Ipv6(_) => ATYP_IPV6,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Request {
    pub command: u8,
    pub address: Address,
    pub port: u16,
}

/// Early-reject outcomes that map directly to a REP code (spec §4.D/§7),
/// distinct from "need more bytes" and from a hard protocol violation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestError {
    UnsupportedCommand,
    UnsupportedAddressType,
}

pub fn parse(input: &[u8]) -> Status<Result<Request, RequestError>> {
    if input.len() < 4 {
        return Status::Incomplete;
    }
    if input[0] != VERSION {
        return Status::Err(ProtoError::BadVersion);
    }
    if input[2] != 0x00 {
        return Status::Err(ProtoError::NonZeroReserved);
    }

    let command = input[1];
    let atyp = input[3];

    let (addr_len, build): (usize, fn(&[u8]) -> Address) = match atyp {
        ATYP_IPV4 => (4, |b| Address::Ipv4(Ipv4Addr::new(b[0], b[1], b[2], b[3]))),
        ATYP_IPV6 => (16, |b| {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(b);
            Address::Ipv6(Ipv6Addr::from(octets))
        }),
        ATYP_DOMAIN => {
            if input.len() < 5 {
                return Status::Incomplete;
            }
            let len = input[4] as usize;
            let needed = 5 + len + 2;
            if input.len() < needed {
                return Status::Incomplete;
            }
            if input.len() > needed {
                return Status::Err(ProtoError::TrailingBytes);
            }

            let domain = String::from_utf8_lossy(&input[5..5 + len]).into_owned();
            let port = u16::from_be_bytes([input[5 + len], input[6 + len]]);

            if command != CMD_CONNECT {
                return Status::Complete {
                    value: Err(RequestError::UnsupportedCommand),
                    consumed: needed,
                };
            }

            return Status::Complete {
                value: Ok(Request {
                    command,
                    address: Address::Domain(domain),
                    port,
                }),
                consumed: needed,
            };
        }
        _ => {
            // Unknown ATYP: we cannot know the address length, so we cannot
            // know how many bytes to consume either. Treat the whole
            // remaining buffer as consumed; the session tears down anyway.
            return Status::Complete {
                value: Err(RequestError::UnsupportedAddressType),
                consumed: input.len(),
            };
        }
    };

    let needed = 4 + addr_len + 2;
    if input.len() < needed {
        return Status::Incomplete;
    }
    if input.len() > needed {
        return Status::Err(ProtoError::TrailingBytes);
    }

    let addr_bytes = &input[4..4 + addr_len];
    let port = u16::from_be_bytes([input[4 + addr_len], input[5 + addr_len]]);

    if command != CMD_CONNECT {
        return Status::Complete {
            value: Err(RequestError::UnsupportedCommand),
            consumed: needed,
        };
    }

    Status::Complete {
        value: Ok(Request {
            command,
            address: build(addr_bytes),
            port,
        }),
        consumed: needed,
    }
}
