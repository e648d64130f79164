//! SOCKS5 reply marshaller (RFC 1928 §6).
//!
//! `VER(1)=0x05 | REP(1) | RSV(1)=0x00 | BND.ATYP(1) | BND.ADDR | BND.PORT(2)`

use std::net::SocketAddr;

use super::request::{ATYP_IPV4, ATYP_IPV6};

pub const VERSION: u8 = 0x05;

pub const REP_SUCCESS: u8 = 0x00;
pub const REP_GENERAL_FAILURE: u8 = 0x01;
pub const REP_HOST_UNREACHABLE: u8 = 0x04;
pub const REP_CONNECTION_REFUSED: u8 = 0x05;
pub const REP_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const REP_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Encodes a reply with the given REP code and bound address. For error
/// replies where no local socket exists yet, pass an unspecified IPv4
/// address and port 0 (matches spec scenario 5: `05 04 00 01 00 00 00 00 00
/// 00`).
pub fn encode(rep: u8, bound: SocketAddr) -> Vec<u8> {
    let mut out = Vec::with_capacity(22);
    out.push(VERSION);
    out.push(rep);
    out.push(0x00);

    match bound {
        SocketAddr::V4(v4) => {
            out.push(ATYP_IPV4);
            out.extend_from_slice(&v4.ip().octets());
        }
        SocketAddr::V6(v6) => {
            out.push(ATYP_IPV6);
            out.extend_from_slice(&v6.ip().octets());
        }
    }

    out.extend_from_slice(&bound.port().to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn encodes_success_ipv4() {
        let bound = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 4321));
        let out = encode(REP_SUCCESS, bound);
        assert_eq!(
            out,
            vec![0x05, 0x00, 0x00, 0x01, 10, 0, 0, 1, 0x10, 0xE1]
        );
    }

    #[test]
    fn encodes_host_unreachable_with_zero_bound() {
        let bound = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        let out = encode(REP_HOST_UNREACHABLE, bound);
        assert_eq!(out, vec![0x05, 0x04, 0x00, 0x01, 0, 0, 0, 0, 0x00, 0x00]);
    }

    #[test]
    fn greeting_then_reply_roundtrip_identity() {
        use crate::proto::greeting::{encode_selection, METHOD_NO_AUTH};
        assert_eq!(encode_selection(METHOD_NO_AUTH), [0x05, 0x00]);
    }
}
