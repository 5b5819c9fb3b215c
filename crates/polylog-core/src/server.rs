//! Receiving side of the network sink
//!
//! A [`LogServer`] accepts TCP connections, decodes the JSON lines a
//! [`NetworkSink`](crate::sinks::NetworkSink) sends and replays each record
//! into a local [`Logging`] instance. Severity, context, timestamp and
//! attributes survive the trip; the local thresholds decide what is kept.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::registry::Logging;
use crate::sinks::decode_line;

/// How often idle connections check for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct Shared {
    target: Logging,
    stop: AtomicBool,
    received: AtomicU64,
    rejected: AtomicU64,
    clients: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn accept_line(&self, line: &[u8]) {
        let Ok(text) = std::str::from_utf8(line) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if text.trim().is_empty() {
            return;
        }
        match decode_line(text) {
            Ok(record) => {
                // An inactive target drops the record like any other call
                let _ = self.target.replay(record);
                self.received.fetch_add(1, Ordering::Release);
            }
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Accepts records from remote [`NetworkSink`](crate::sinks::NetworkSink)s
///
/// # Example
///
/// ```no_run
/// use polylog_core::config::LoggingConfig;
/// use polylog_core::registry::Logging;
/// use polylog_core::server::LogServer;
///
/// let logging = Logging::init(LoggingConfig::default()).unwrap();
/// let mut server = LogServer::bind("0.0.0.0:5140", logging).unwrap();
/// // ...
/// server.shutdown();
/// ```
pub struct LogServer {
    address: SocketAddr,
    shared: Arc<Shared>,
    acceptor: Option<JoinHandle<()>>,
}

impl fmt::Debug for LogServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogServer")
            .field("address", &self.address)
            .field("received", &self.received())
            .field("rejected", &self.rejected())
            .finish()
    }
}

impl LogServer {
    /// Listen on `address` and replay received records into `target`
    pub fn bind(address: impl ToSocketAddrs, target: Logging) -> io::Result<Self> {
        let listener = TcpListener::bind(address)?;
        let address = listener.local_addr()?;
        let shared = Arc::new(Shared {
            target,
            stop: AtomicBool::new(false),
            received: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            clients: Mutex::new(Vec::new()),
        });
        let acceptor_shared = Arc::clone(&shared);
        let acceptor = thread::Builder::new()
            .name("polylog-server".to_string())
            .spawn(move || accept_loop(listener, acceptor_shared))?;
        Ok(Self {
            address,
            shared,
            acceptor: Some(acceptor),
        })
    }

    /// Bound address (useful after binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Records decoded and handed to the target
    pub fn received(&self) -> u64 {
        self.shared.received.load(Ordering::Acquire)
    }

    /// Lines that were not valid records
    pub fn rejected(&self) -> u64 {
        self.shared.rejected.load(Ordering::Relaxed)
    }

    /// Stop accepting and wait for connection threads to finish
    ///
    /// Idempotent. The target instance is left running.
    pub fn shutdown(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        // Wake the blocking accept
        let _ = TcpStream::connect_timeout(&self.address, Duration::from_secs(1));
        let _ = acceptor.join();
        let clients = std::mem::take(&mut *self.shared.clients.lock());
        for client in clients {
            let _ = client.join();
        }
    }
}

impl Drop for LogServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    for stream in listener.incoming() {
        if shared.stopping() {
            break;
        }
        let Ok(stream) = stream else {
            continue;
        };
        let client_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("polylog-server-client".to_string())
            .spawn(move || serve(stream, client_shared));
        if let Ok(handle) = spawned {
            let mut clients = shared.clients.lock();
            clients.retain(|client| !client.is_finished());
            clients.push(handle);
        }
    }
}

fn serve(stream: TcpStream, shared: Arc<Shared>) {
    if stream.set_read_timeout(Some(POLL_INTERVAL)).is_err() {
        return;
    }
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                shared.accept_line(&line);
                line.clear();
                if shared.stopping() {
                    break;
                }
            }
            // A partial line stays in `line` until the rest arrives
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) =>
            {
                if shared.stopping() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}
