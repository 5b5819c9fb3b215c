//! Output destinations for records
//!
//! Built-in sinks:
//! - `StreamSink`: any byte stream
//! - `ConsoleSink`: stdout/stderr
//! - `FileSink`: append-mode file with rotation
//! - `MemorySink`: in-memory capture
//! - `CallbackSink`: host closure
//! - `NetworkSink`: JSON lines over TCP
//! - `SyslogSink`: local syslog daemon (unix)

mod traits;
mod flush;
pub mod format;
mod stream;
mod console;
mod file;
mod memory;
mod callback;
mod network;
#[cfg(unix)]
mod syslog_sink;

pub use traits::{Sink, SinkError, SinkResult, BoxedSink, LostRecords};
pub use flush::FlushPolicy;
pub use format::{render_line, render_body, parse_line, ParsedLine, ParseError};
pub use stream::StreamSink;
pub use console::{ConsoleSink, ConsoleStream};
pub use file::{FileSink, Rotation, BACKLOG_MAX};
pub use memory::MemorySink;
pub use callback::{CallbackSink, CallbackFn};
pub use network::{NetworkSink, NetworkOptions, decode_line};
#[cfg(unix)]
pub use syslog_sink::SyslogSink;
