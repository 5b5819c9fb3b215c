//! Network sink: JSON lines over TCP
//!
//! Records are serialized on the caller's thread and pushed onto a bounded
//! queue. A worker thread owned by the sink drains the queue and writes each
//! record as one JSON object per line ([`OwnedRecord`] encoding). The caller
//! never waits longer than the enqueue timeout. Records the worker cannot
//! deliver are counted one by one and reported through [`Sink::lost`].

use std::collections::VecDeque;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::traits::{LostRecords, Sink, SinkError, SinkResult};
use crate::types::{OwnedRecord, Record};

/// Tuning for a [`NetworkSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkOptions {
    /// Maximum number of records waiting for delivery
    pub queue_capacity: usize,
    /// How long a write may wait for queue space before failing
    pub enqueue_timeout: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// How long flush waits for the queue to drain
    pub flush_timeout: Duration,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            enqueue_timeout: Duration::from_millis(10),
            connect_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            flush_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    in_flight: bool,
    closed: bool,
    delivered: u64,
    failures: u64,
    last_failure: Option<String>,
}

/// Bounded MPSC queue with timed push and idle tracking
#[derive(Debug)]
struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    idle: Condvar,
}

impl<T> BoundedQueue<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                in_flight: false,
                closed: false,
                delivered: 0,
                failures: 0,
                last_failure: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    fn push(&self, item: T, timeout: Duration) -> SinkResult<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity {
            if state.closed {
                return Err(SinkError::Closed);
            }
            if self.not_full.wait_until(&mut state, deadline).timed_out()
                && state.items.len() >= self.capacity
            {
                return Err(SinkError::QueueFull(timeout));
            }
        }
        if state.closed {
            return Err(SinkError::Closed);
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Next item for the worker; `None` once closed. Items still queued at
    /// close are dropped and counted as failures.
    fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                let dropped = state.items.len() as u64;
                if dropped > 0 {
                    state.failures += dropped;
                    state.last_failure = Some("dropped at shutdown".to_string());
                    state.items.clear();
                }
                self.idle.notify_all();
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                state.in_flight = true;
                self.not_full.notify_one();
                return Some(item);
            }
            self.idle.notify_all();
            self.not_empty.wait(&mut state);
        }
    }

    fn finish(&self, result: io::Result<()>) {
        let mut state = self.state.lock();
        state.in_flight = false;
        match result {
            Ok(()) => state.delivered += 1,
            Err(err) => {
                state.failures += 1;
                state.last_failure = Some(err.to_string());
            }
        }
        if state.items.is_empty() {
            self.idle.notify_all();
        }
    }

    /// Wait until nothing is queued or in flight
    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.items.is_empty() || state.in_flight {
            if state.closed {
                return false;
            }
            if self.idle.wait_until(&mut state, deadline).timed_out()
                && (!state.items.is_empty() || state.in_flight)
            {
                return false;
            }
        }
        true
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        self.idle.notify_all();
    }

    fn stats(&self) -> (u64, u64, Option<String>) {
        let state = self.state.lock();
        (state.delivered, state.failures, state.last_failure.clone())
    }
}

/// Sends records to a TCP endpoint as JSON lines
///
/// # Example
///
/// ```no_run
/// use polylog_core::sinks::{NetworkOptions, NetworkSink};
///
/// let sink = NetworkSink::connect("127.0.0.1:5140", NetworkOptions::default()).unwrap();
/// ```
#[derive(Debug)]
pub struct NetworkSink {
    name: String,
    options: NetworkOptions,
    queue: Arc<BoundedQueue<String>>,
    worker: Option<JoinHandle<()>>,
}

impl NetworkSink {
    /// Start the delivery worker for `address`
    ///
    /// The connection itself is opened lazily by the worker, so an endpoint
    /// that is down does not fail construction.
    pub fn connect(address: impl Into<String>, options: NetworkOptions) -> SinkResult<Self> {
        let address = address.into();
        let queue = Arc::new(BoundedQueue::new(options.queue_capacity));
        let worker_queue = Arc::clone(&queue);
        let worker_address = address.clone();
        let worker = thread::Builder::new()
            .name("polylog-network".to_string())
            .spawn(move || deliver_loop(worker_queue, worker_address, options))?;
        Ok(Self {
            name: format!("network:{}", address),
            options,
            queue,
            worker: Some(worker),
        })
    }

    /// Records delivered so far
    pub fn delivered(&self) -> u64 {
        self.queue.stats().0
    }

    /// Records that could not be delivered so far
    pub fn failures(&self) -> u64 {
        self.queue.stats().1
    }
}

fn deliver_loop(queue: Arc<BoundedQueue<String>>, address: String, options: NetworkOptions) {
    let mut stream: Option<TcpStream> = None;
    while let Some(line) = queue.pop() {
        let result = deliver(&mut stream, &address, &options, &line);
        queue.finish(result);
    }
}

fn deliver(
    stream: &mut Option<TcpStream>,
    address: &str,
    options: &NetworkOptions,
    line: &str,
) -> io::Result<()> {
    let mut conn = match stream.take() {
        Some(conn) => conn,
        None => open(address, options)?,
    };
    let result = conn
        .write_all(line.as_bytes())
        .and_then(|_| conn.write_all(b"\n"))
        .and_then(|_| conn.flush());
    // A broken connection is dropped; the next record reconnects
    if result.is_ok() {
        *stream = Some(conn);
    }
    result
}

fn open(address: &str, options: &NetworkOptions) -> io::Result<TcpStream> {
    let addr = address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve", address),
        )
    })?;
    let conn = TcpStream::connect_timeout(&addr, options.connect_timeout)?;
    conn.set_write_timeout(Some(options.write_timeout))?;
    conn.set_nodelay(true)?;
    Ok(conn)
}

impl Sink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        if self.worker.is_none() {
            return Err(SinkError::Closed);
        }
        let line = serde_json::to_string(&record.to_owned_record())?;
        self.queue.push(line, self.options.enqueue_timeout)
    }

    fn flush(&mut self) -> SinkResult<()> {
        if self.worker.is_none() {
            return Ok(());
        }
        if !self.queue.wait_idle(self.options.flush_timeout) {
            return Err(SinkError::Timeout(self.options.flush_timeout));
        }
        Ok(())
    }

    fn lost(&self) -> LostRecords {
        let (_, count, last_error) = self.queue.stats();
        LostRecords { count, last_error }
    }

    fn close(&mut self) -> SinkResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // Give queued records a bounded chance to go out first
        let drained = if self.queue.wait_idle(self.options.flush_timeout) {
            Ok(())
        } else {
            Err(SinkError::Timeout(self.options.flush_timeout))
        };
        self.queue.close();
        worker
            .join()
            .map_err(|_| SinkError::Io(io::Error::new(io::ErrorKind::Other, "network worker panicked")))?;
        drained
    }
}

impl Drop for NetworkSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Decode one line written by a [`NetworkSink`]
pub fn decode_line(line: &str) -> Result<OwnedRecord, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}
