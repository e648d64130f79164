//! POP3 credential sniffer: captures after a `USER` line followed by a
//! `PASS` line (case-insensitive keyword, whitespace-separated).

use super::{Captured, LineAccumulator};

const MAX_LINE: usize = 1024;

pub struct Pop3Sniffer {
    lines: LineAccumulator,
    pending_user: Option<String>,
    captured: Option<Captured>,
}

impl Pop3Sniffer {
    pub fn new() -> Self {
        Self {
            lines: LineAccumulator::new(MAX_LINE),
            pending_user: None,
            captured: None,
        }
    }

    pub fn captured(&self) -> Option<&Captured> {
        self.captured.as_ref()
    }

    /// Feeds one chunk of client→origin bytes. No-op once a capture has
    /// already occurred (spec: emitted at most once per session).
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
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let Some(keyword) = parts.next() else {
            return;
        };
        let arg = parts.next().unwrap_or("").trim();

        if keyword.eq_ignore_ascii_case("USER") {
            self.pending_user = Some(arg.to_string());
        } else if keyword.eq_ignore_ascii_case("PASS") {
            if let Some(username) = self.pending_user.take() {
                self.captured = Some(Captured {
                    username,
                    password: arg.to_string(),
                });
            }
        }
    }
}

impl Default for Pop3Sniffer {
    fn default() -> Self {
        Self::new()
    }
}
