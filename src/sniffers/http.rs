//! HTTP Basic-auth sniffer: captures on finding an
//! `Authorization: Basic <base64>` header (case-insensitive), decoding the
//! value and splitting on the first `:`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::{Captured, LineAccumulator};

const MAX_LINE: usize = 8192;
const HEADER_PREFIX: &str = "authorization:";
const SCHEME_PREFIX: &str = "basic ";

pub struct HttpSniffer {
    lines: LineAccumulator,
    captured: Option<Captured>,
}

impl HttpSniffer {
    pub fn new() -> Self {
        Self {
            lines: LineAccumulator::new(MAX_LINE),
            captured: None,
        }
    }

    pub fn captured(&self) -> Option<&Captured> {
        self.captured.as_ref()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if self.captured.is_some() {
            return;
        }

        for &byte in chunk {
            if let Some(line) = self.lines.push(byte) {
                self.observe_line(&line);
                if self.captured.is_some() {
                    return;
                }
            }
        }
    }

    fn observe_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let lower = line.to_ascii_lowercase();

        let Some(rest) = lower.strip_prefix(HEADER_PREFIX) else {
            return;
        };
        let rest = rest.trim_start();
        let Some(encoded_lower_start) = rest.strip_prefix(SCHEME_PREFIX) else {
            return;
        };

        // Recover the original-case encoded value from the original line,
        // since base64 payloads are case-sensitive.
        let original_value_offset = line.len() - encoded_lower_start.len();
        let encoded = line[original_value_offset..].trim();

        let Ok(decoded) = BASE64.decode(encoded) else {
            return;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return;
        };

        if let Some((username, password)) = decoded.split_once(':') {
            self.captured = Some(Captured {
                username: username.to_string(),
                password: password.to_string(),
            });
        }
    }
}

impl Default for HttpSniffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_header(user: &str, pass: &str) -> String {
        let encoded = BASE64.encode(format!("{user}:{pass}"));
        format!("Authorization: Basic {encoded}\r\n")
    }

    #[test]
    fn captures_valid_basic_auth() {
        let mut sniffer = HttpSniffer::new();
        let request = format!(
            "GET / HTTP/1.1\r\nHost: example.com\r\n{}\r\n",
            basic_header("alice", "pw")
        );
        sniffer.feed(request.as_bytes());
        let captured = sniffer.captured().unwrap();
        assert_eq!(captured.username, "alice");
        assert_eq!(captured.password, "pw");
    }

    #[test]
    fn header_name_is_case_insensitive() {
        let mut sniffer = HttpSniffer::new();
        let encoded = BASE64.encode("bob:secret");
        sniffer.feed(format!("AUTHORIZATION: BASIC {encoded}\r\n").as_bytes());
        assert_eq!(sniffer.captured().unwrap().username, "bob");
    }

    #[test]
    fn ignores_unrelated_headers() {
        let mut sniffer = HttpSniffer::new();
        sniffer.feed(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert!(sniffer.captured().is_none());
    }

    #[test]
    fn malformed_base64_does_not_panic_or_capture() {
        let mut sniffer = HttpSniffer::new();
        sniffer.feed(b"Authorization: Basic not-base64!!!\r\n");
        assert!(sniffer.captured().is_none());
    }
}
