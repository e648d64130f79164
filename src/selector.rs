//! Readiness selector (spec §4.B).
//!
//! The concrete selector in this codebase is the Tokio reactor: every
//! session, the acceptor, and the monitor plane are plain `tokio::task`s on
//! a single-threaded runtime, and Tokio's `AsyncRead`/`AsyncWrite`
//! readiness *is* the interest-mask/ready-event mechanism the spec
//! describes. What remains to implement explicitly is the one piece Tokio
//! does not hand you for free: a self-pipe-style wakeup that lets an
//! arbitrary OS thread (the resolver pool, §4.E) nudge the event-loop task
//! without ever running session code on that thread.
//!
//! `Wakeup<T>` is exactly that: a bounded-memory, unbounded-depth MPSC
//! channel. Any thread can `push`; only the event-loop task holds the
//! receiving half and drains it.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

pub struct WakeupSender<T>(UnboundedSender<T>);

impl<T> Clone for WakeupSender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> WakeupSender<T> {
    /// Called from a worker thread. Never blocks; the receiver end is
    /// always alive for the lifetime of the process in this design.
    pub fn push(&self, value: T) {
        let _ = self.0.send(value);
    }
}

pub struct WakeupReceiver<T>(UnboundedReceiver<T>);

impl<T> WakeupReceiver<T> {
    /// Drains everything currently queued without waiting, per spec §4.E
    /// ("drains all waiting completed jobs").
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(value) = self.0.try_recv() {
            out.push(value);
        }
        out
    }

    /// Waits for the first available item, then drains the rest.
    pub async fn recv_batch(&mut self) -> Option<Vec<T>> {
        let first = self.0.recv().await?;
        let mut out = vec![first];
        out.extend(self.drain_ready());
        Some(out)
    }
}

pub fn wakeup_channel<T>() -> (WakeupSender<T>, WakeupReceiver<T>) {
    let (tx, rx) = unbounded_channel();
    (WakeupSender(tx), WakeupReceiver(rx))
}
