//! Process-wide metrics (spec §3 Metrics, §4.I).
//!
//! Grounded on `statistics.rs` in the teacher: a `Number`-like trait over a
//! counter primitive, plus a single struct owning every counter and a
//! render function colocated with the data it reads. Every counter here is
//! an `AtomicU64` with `Relaxed` ordering: the whole event loop runs on one
//! Tokio task, so there is never real contention, but `tokio::spawn`
//! requires `Send + 'static` state, which rules out a bare `Cell`.

use std::sync::atomic::{AtomicU64, Ordering};

const REP_SLOTS: usize = 256;

pub struct Metrics {
    pub total_connections: AtomicU64,
    pub current_connections: AtomicU64,
    pub max_concurrent_connections: AtomicU64,
    pub bytes_client_to_origin: AtomicU64,
    pub bytes_origin_to_client: AtomicU64,
    pub auth_ok: AtomicU64,
    pub auth_fail: AtomicU64,
    pub dns_ok: AtomicU64,
    pub dns_fail: AtomicU64,
    rep_code_count: [AtomicU64; REP_SLOTS],
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            current_connections: AtomicU64::new(0),
            max_concurrent_connections: AtomicU64::new(0),
            bytes_client_to_origin: AtomicU64::new(0),
            bytes_origin_to_client: AtomicU64::new(0),
            auth_ok: AtomicU64::new(0),
            auth_fail: AtomicU64::new(0),
            dns_ok: AtomicU64::new(0),
            dns_fail: AtomicU64::new(0),
            rep_code_count: [const { AtomicU64::new(0) }; REP_SLOTS],
        }
    }
}

impl Metrics {
    pub fn session_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        let current = self.current_connections.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_concurrent_connections
            .fetch_max(current, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.current_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_client_to_origin(&self, n: u64) {
        self.bytes_client_to_origin.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_origin_to_client(&self, n: u64) {
        self.bytes_origin_to_client.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_auth(&self, ok: bool) {
        if ok {
            self.auth_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.auth_fail.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dns(&self, ok: bool) {
        if ok {
            self.dns_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dns_fail.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records exactly one reply code for a session. Spec invariant: called
    /// at most once per session.
    pub fn record_reply(&self, code: u8) {
        self.rep_code_count[code as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.total_connections.store(0, Ordering::Relaxed);
        self.current_connections.store(0, Ordering::Relaxed);
        self.max_concurrent_connections.store(0, Ordering::Relaxed);
        self.bytes_client_to_origin.store(0, Ordering::Relaxed);
        self.bytes_origin_to_client.store(0, Ordering::Relaxed);
        self.auth_ok.store(0, Ordering::Relaxed);
        self.auth_fail.store(0, Ordering::Relaxed);
        self.dns_ok.store(0, Ordering::Relaxed);
        self.dns_fail.store(0, Ordering::Relaxed);
        for slot in &self.rep_code_count {
            slot.store(0, Ordering::Relaxed);
        }
    }

    /// Human-readable snapshot for the monitor plane (spec §4.G/§6).
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(512);
        out.push_str(&format!(
            "total_connections: {}\n",
            self.total_connections.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "current_connections: {}\n",
            self.current_connections.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "max_concurrent_connections: {}\n",
            self.max_concurrent_connections.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "bytes_client_to_origin: {}\n",
            self.bytes_client_to_origin.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "bytes_origin_to_client: {}\n",
            self.bytes_origin_to_client.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "auth_ok: {}\n",
            self.auth_ok.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "auth_fail: {}\n",
            self.auth_fail.load(Ordering::Relaxed)
        ));
        out.push_str(&format!("dns_ok: {}\n", self.dns_ok.load(Ordering::Relaxed)));
        out.push_str(&format!(
            "dns_fail: {}\n",
            self.dns_fail.load(Ordering::Relaxed)
        ));
        out.push_str("Reply Codes:\n");
        for (code, count) in self.rep_code_count.iter().enumerate() {
            let count = count.load(Ordering::Relaxed);
            if count > 0 {
                out.push_str(&format!("  0x{:02X}: {}\n", code, count));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_yields_all_zero_counters() {
        let m = Metrics::default();
        m.session_opened();
        m.add_client_to_origin(10);
        m.record_reply(0x00);
        m.reset();
        assert_eq!(m.total_connections.load(Ordering::Relaxed), 0);
        assert!(!m.render().contains("0x00:"));
    }

    #[test]
    fn max_concurrent_tracks_running_maximum() {
        let m = Metrics::default();
        m.session_opened();
        m.session_opened();
        m.session_closed();
        m.session_opened();
        assert_eq!(m.max_concurrent_connections.load(Ordering::Relaxed), 2);
        assert_eq!(m.current_connections.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn render_omits_zero_reply_codes() {
        let m = Metrics::default();
        let rendered = m.render();
        assert!(rendered.contains("total_connections: 0"));
        assert!(rendered.ends_with("Reply Codes:\n"));
    }
}
