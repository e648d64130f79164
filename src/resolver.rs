//! Asynchronous DNS resolver (spec §4.E).
//!
//! A bounded pool of worker threads (default 2, clamped to 1-4) consumes
//! jobs from a FIFO queue, performs a blocking `ToSocketAddrs` lookup, and
//! posts the result back to the event-loop task through the
//! `selector::Wakeup` self-pipe analogue. Session code never runs on a
//! worker thread: the event-loop task is the only place a job's callback
//! runs.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::oneshot;

use crate::selector::{WakeupReceiver, WakeupSender, wakeup_channel};

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 4;
pub const DEFAULT_WORKERS: usize = 2;

pub struct ResolveJob {
    pub session_key: u64,
    pub host: String,
    pub port: u16,
}

pub struct ResolveResult {
    pub session_key: u64,
    pub addresses: Result<Vec<SocketAddr>, std::io::Error>,
}

pub struct Resolver {
    job_tx: std_mpsc::Sender<ResolveJob>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<Mutex<bool>>,
}

impl Resolver {
    /// Spawns `worker_count` (clamped to 1-4) blocking-resolution workers
    /// and returns the resolver handle plus the receiving half of the
    /// wakeup channel the event loop should poll.
    pub fn spawn(worker_count: usize) -> (Self, WakeupReceiver<ResolveResult>) {
        let worker_count = worker_count.clamp(MIN_WORKERS, MAX_WORKERS);
        let (job_tx, job_rx) = std_mpsc::channel::<ResolveJob>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = wakeup_channel::<ResolveResult>();
        let shutdown = Arc::new(Mutex::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let result_tx: WakeupSender<ResolveResult> = result_tx.clone();
            let shutdown = shutdown.clone();
            workers.push(std::thread::spawn(move || {
                worker_loop(job_rx, result_tx, shutdown);
            }));
        }

        (
            Self {
                job_tx,
                workers,
                shutdown,
            },
            result_rx,
        )
    }

    /// Enqueues a lookup. Never blocks the event-loop thread.
    pub fn resolve(&self, session_key: u64, host: String, port: u16) {
        let _ = self.job_tx.send(ResolveJob {
            session_key,
            host,
            port,
        });
    }

    pub fn shutdown(self) {
        *self.shutdown.lock().unwrap() = true;
        // Dropping job_tx lets blocked `recv()` calls observe disconnection.
        drop(self.job_tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Vec<SocketAddr>, io::Error>>>>>;

/// Session-facing handle: turns the worker pool's self-pipe completions into
/// a plain `.await`-able call, keyed per request rather than per session so a
/// session can issue more than one lookup. A single dispatcher task (spawned
/// once, at startup) owns the `WakeupReceiver` and is the concrete
/// "event-loop task reacting to the self-pipe" the spec describes; session
/// tasks never touch the receiver directly.
#[derive(Clone)]
pub struct ResolverHandle {
    inner: Arc<Resolver>,
    pending: Pending,
    next_key: Arc<AtomicU64>,
}

impl ResolverHandle {
    pub fn spawn(worker_count: usize) -> Self {
        let (resolver, mut result_rx) = Resolver::spawn(worker_count);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let dispatcher_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(batch) = result_rx.recv_batch().await {
                let mut pending = dispatcher_pending.lock().unwrap();
                for result in batch {
                    if let Some(sender) = pending.remove(&result.session_key) {
                        let _ = sender.send(result.addresses);
                    }
                }
            }
        });

        Self {
            inner: Arc::new(resolver),
            pending,
            next_key: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn resolve(&self, host: String, port: u16) -> Result<Vec<SocketAddr>, io::Error> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(key, tx);
        self.inner.resolve(key, host, port);

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(io::Error::other("resolver dispatcher dropped")),
        }
    }
}

fn worker_loop(
    job_rx: Arc<Mutex<std_mpsc::Receiver<ResolveJob>>>,
    result_tx: WakeupSender<ResolveResult>,
    shutdown: Arc<Mutex<bool>>,
) {
    loop {
        if *shutdown.lock().unwrap() {
            return;
        }

        let job = {
            let rx = job_rx.lock().unwrap();
            rx.recv()
        };

        let Ok(job) = job else {
            return;
        };

        let addresses = std::net::ToSocketAddrs::to_socket_addrs(&(job.host.as_str(), job.port))
            .map(|iter| iter.collect::<Vec<_>>());

        result_tx.push(ResolveResult {
            session_key: job.session_key,
            addresses,
        });
    }
}
