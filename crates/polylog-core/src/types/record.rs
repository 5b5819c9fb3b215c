//! Log record types

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::unsync::Lazy;
use serde::{Deserialize, Serialize};

use super::attrs::Attributes;
use super::severity::Severity;

type Formatter<'a> = Box<dyn FnOnce() -> String + 'a>;

/// Where a record's message text comes from
///
/// `Deferred` holds a closure that is only called when a sink that accepts
/// the record actually reads the message.
pub enum MessageSource<'a> {
    Text(String),
    Deferred(Formatter<'a>),
}

impl<'a> MessageSource<'a> {
    /// Wrap a formatter closure
    pub fn deferred(f: impl FnOnce() -> String + 'a) -> Self {
        MessageSource::Deferred(Box::new(f))
    }
}

impl From<String> for MessageSource<'_> {
    fn from(s: String) -> Self {
        MessageSource::Text(s)
    }
}

impl From<&str> for MessageSource<'_> {
    fn from(s: &str) -> Self {
        MessageSource::Text(s.to_string())
    }
}

impl fmt::Debug for MessageSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSource::Text(s) => f.debug_tuple("Text").field(s).finish(),
            MessageSource::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

enum Message<'a> {
    Text(String),
    Deferred(Lazy<String, Formatter<'a>>),
}

impl Message<'_> {
    fn get(&self) -> &str {
        match self {
            Message::Text(s) => s,
            Message::Deferred(lazy) => Lazy::force(lazy).as_str(),
        }
    }
}

/// One immutable logging event
///
/// Created when a logging operation is invoked and dropped once every sink
/// has seen it. The timestamp is captured in [`Record::new`].
pub struct Record<'a> {
    severity: Severity,
    timestamp: DateTime<Utc>,
    context: Arc<str>,
    message: Message<'a>,
    attrs: Attributes,
}

impl<'a> Record<'a> {
    pub fn new(
        severity: Severity,
        context: impl Into<Arc<str>>,
        message: impl Into<MessageSource<'a>>,
        attrs: Attributes,
    ) -> Self {
        let message = match message.into() {
            MessageSource::Text(s) => Message::Text(s),
            MessageSource::Deferred(f) => Message::Deferred(Lazy::new(f)),
        };
        Self {
            severity,
            timestamp: Utc::now(),
            context: context.into(),
            message,
            attrs,
        }
    }

    /// Keep a timestamp taken elsewhere, e.g. by a remote process
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Logger name the record was emitted under
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Message text, running a deferred formatter on first access
    pub fn message(&self) -> &str {
        self.message.get()
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Copy into an owned, serializable snapshot
    pub fn to_owned_record(&self) -> OwnedRecord {
        OwnedRecord {
            severity: self.severity,
            timestamp: self.timestamp,
            context: self.context.to_string(),
            message: self.message().to_string(),
            attrs: self.attrs.clone(),
        }
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("severity", &self.severity)
            .field("timestamp", &self.timestamp)
            .field("context", &self.context)
            .field("attrs", &self.attrs)
            .finish()
    }
}

/// Owned copy of a [`Record`]
///
/// Used by the in-memory sink and as the network wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedRecord {
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_text_record() {
        let record = Record::new(Severity::Info, "app", "hello", Attributes::new());
        assert_eq!(record.severity(), Severity::Info);
        assert_eq!(record.context(), "app");
        assert_eq!(record.message(), "hello");
        assert!(record.attrs().is_empty());
    }

    #[test]
    fn test_deferred_message_runs_once_on_access() {
        let calls = Cell::new(0);
        let record = Record::new(
            Severity::Debug,
            "app",
            MessageSource::deferred(|| {
                calls.set(calls.get() + 1);
                "lazy".to_string()
            }),
            Attributes::new(),
        );
        assert_eq!(calls.get(), 0);
        assert_eq!(record.message(), "lazy");
        assert_eq!(record.message(), "lazy");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_deferred_message_never_read() {
        let calls = Cell::new(0);
        {
            let _record = Record::new(
                Severity::Debug,
                "app",
                MessageSource::deferred(|| {
                    calls.set(calls.get() + 1);
                    String::new()
                }),
                Attributes::new(),
            );
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_owned_record_json() {
        let record = Record::new(Severity::Error, "db", "boom", crate::attrs! { "code" => 7 });
        let owned = record.to_owned_record();
        let json = serde_json::to_string(&owned).unwrap();
        assert!(json.contains("\"severity\":\"error\""));
        assert!(json.contains("\"code\":7"));
        let back: OwnedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, owned);
    }
}
