//! Syslog sink (unix only)
//!
//! Records go to the local daemon as RFC 3164 messages under the `user`
//! facility. The daemon adds its own timestamp, so only the context, message
//! and attributes are sent.

use std::fmt;

use ::syslog::{Facility, Formatter3164, Logger, LoggerBackend};

use super::format::render_body;
use super::traits::{Sink, SinkError, SinkResult};
use crate::types::{Record, Severity};

type Connection = Logger<LoggerBackend, Formatter3164>;

/// Writes records to the local syslog daemon
///
/// A failed send drops the connection; the next write reconnects.
pub struct SyslogSink {
    name: String,
    formatter: Formatter3164,
    conn: Option<Connection>,
    closed: bool,
}

impl fmt::Debug for SyslogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogSink")
            .field("process", &self.formatter.process)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

fn syslog_error(e: impl fmt::Display) -> SinkError {
    SinkError::Syslog(e.to_string())
}

impl SyslogSink {
    /// Connect to the daemon, tagging messages with `process`
    pub fn connect(process: impl Into<String>) -> SinkResult<Self> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_USER,
            hostname: None,
            process: process.into(),
            pid: std::process::id(),
        };
        let conn = ::syslog::unix(formatter.clone()).map_err(syslog_error)?;
        Ok(Self {
            name: format!("syslog:{}", formatter.process),
            formatter,
            conn: Some(conn),
            closed: false,
        })
    }
}

impl Sink for SyslogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.conn.is_none() {
            self.conn = Some(::syslog::unix(self.formatter.clone()).map_err(syslog_error)?);
        }
        let conn = self.conn.as_mut().ok_or(SinkError::Closed)?;
        let body = render_body(record);
        let sent = match record.severity() {
            Severity::Trace | Severity::Debug => conn.debug(body),
            Severity::Info => conn.info(body),
            Severity::Warn => conn.warning(body),
            Severity::Error => conn.err(body),
            Severity::Fatal => conn.crit(body),
        };
        if let Err(e) = sent {
            self.conn = None;
            return Err(syslog_error(e));
        }
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        self.conn = None;
        self.closed = true;
        Ok(())
    }
}
