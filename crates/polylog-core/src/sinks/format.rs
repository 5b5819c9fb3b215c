//! Human-readable line format and its matching reader
//!
//! ```text
//! [2026-10-19T08:15:02.117Z] [ERROR] [db.pool] connection lost {code=7, host="db-1"}
//! ```
//!
//! Escaping keeps the line unambiguous: the context escapes `]`, the message
//! escapes `{`, quoted strings escape `"`, and all of them escape `\` and
//! line breaks. String attribute values are always quoted; numbers and
//! booleans are bare.

use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::types::{AttrValue, Attributes, Record, Severity};

/// Render a record as one line, without the trailing newline
pub fn render_line(record: &Record<'_>) -> String {
    let mut line = String::with_capacity(64 + record.message().len());
    line.push('[');
    line.push_str(&record.timestamp().to_rfc3339_opts(SecondsFormat::Millis, true));
    line.push_str("] [");
    line.push_str(record.severity().as_str());
    line.push_str("] ");
    push_body(&mut line, record);
    line
}

/// Context, message and attributes only: `[ctx] msg {k=v}`
///
/// For destinations that stamp time and severity themselves, like syslog.
pub fn render_body(record: &Record<'_>) -> String {
    let mut body = String::with_capacity(32 + record.message().len());
    push_body(&mut body, record);
    body
}

fn push_body(line: &mut String, record: &Record<'_>) {
    line.push('[');
    escape_into(line, record.context(), &[']']);
    line.push_str("] ");
    escape_into(line, record.message(), &['{']);
    if !record.attrs().is_empty() {
        line.push_str(" {");
        for (i, (key, value)) in record.attrs().iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            if is_bare_key(key) {
                line.push_str(key);
            } else {
                push_quoted(line, key);
            }
            line.push('=');
            match value {
                AttrValue::Str(s) => push_quoted(line, s),
                other => {
                    let _ = write!(line, "{}", other);
                }
            }
        }
        line.push('}');
    }
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | '/'))
}

fn escape_into(out: &mut String, s: &str, extra: &[char]) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if extra.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    escape_into(out, s, &['"']);
    out.push('"');
}

/// Errors from [`parse_line`]
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed line: bad {0}")]
    Malformed(&'static str),

    #[error("Bad timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Unknown level: {0}")]
    Level(String),
}

/// A line read back by [`parse_line`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub context: String,
    pub message: String,
    pub attrs: Attributes,
}

/// Parse one line produced by [`render_line`]
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut cur = Cursor {
        chars: line.chars().peekable(),
    };

    let timestamp = cur.bracketed(false, "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)?.with_timezone(&Utc);
    cur.expect(' ', "separator")?;
    let level = cur.bracketed(false, "level")?;
    let severity: Severity = level.parse().map_err(|_| ParseError::Level(level.clone()))?;
    cur.expect(' ', "separator")?;
    let context = cur.bracketed(true, "context")?;
    cur.expect(' ', "separator")?;

    let mut message = String::new();
    let mut attrs = Attributes::new();
    while let Some(c) = cur.chars.next() {
        match c {
            '\\' => message.push(cur.unescape("message")?),
            '{' => {
                if message.pop() != Some(' ') {
                    return Err(ParseError::Malformed("attribute block"));
                }
                attrs = cur.attrs()?;
                break;
            }
            c => message.push(c),
        }
    }
    if cur.chars.next().is_some() {
        return Err(ParseError::Malformed("trailing characters"));
    }

    Ok(ParsedLine {
        timestamp,
        severity,
        context,
        message,
        attrs,
    })
}

struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Cursor<'_> {
    fn expect(&mut self, want: char, what: &'static str) -> Result<(), ParseError> {
        match self.chars.next() {
            Some(c) if c == want => Ok(()),
            _ => Err(ParseError::Malformed(what)),
        }
    }

    fn unescape(&mut self, what: &'static str) -> Result<char, ParseError> {
        match self.chars.next() {
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some(c) => Ok(c),
            None => Err(ParseError::Malformed(what)),
        }
    }

    fn bracketed(&mut self, escaped: bool, what: &'static str) -> Result<String, ParseError> {
        self.expect('[', what)?;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ParseError::Malformed(what)),
                Some(']') => return Ok(out),
                Some('\\') if escaped => out.push(self.unescape(what)?),
                Some(c) => out.push(c),
            }
        }
    }

    fn quoted(&mut self, what: &'static str) -> Result<String, ParseError> {
        self.expect('"', what)?;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ParseError::Malformed(what)),
                Some('"') => return Ok(out),
                Some('\\') => out.push(self.unescape(what)?),
                Some(c) => out.push(c),
            }
        }
    }

    fn until(&mut self, stops: &[char]) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if stops.contains(&c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn attrs(&mut self) -> Result<Attributes, ParseError> {
        let mut attrs = Attributes::new();
        loop {
            let key = if self.chars.peek() == Some(&'"') {
                self.quoted("attribute key")?
            } else {
                self.until(&['='])
            };
            if key.is_empty() {
                return Err(ParseError::Malformed("attribute key"));
            }
            self.expect('=', "attribute")?;
            let value = if self.chars.peek() == Some(&'"') {
                AttrValue::Str(self.quoted("attribute value")?)
            } else {
                typed_value(&self.until(&[',', '}']))?
            };
            attrs.insert(key, value);
            match self.chars.next() {
                Some('}') => return Ok(attrs),
                Some(',') => self.expect(' ', "attribute separator")?,
                _ => return Err(ParseError::Malformed("attribute block")),
            }
        }
    }
}

fn typed_value(token: &str) -> Result<AttrValue, ParseError> {
    match token {
        "true" => return Ok(AttrValue::Bool(true)),
        "false" => return Ok(AttrValue::Bool(false)),
        _ => {}
    }
    if let Ok(i) = token.parse::<i64>() {
        return Ok(AttrValue::Int(i));
    }
    token
        .parse::<f64>()
        .map(AttrValue::Float)
        .map_err(|_| ParseError::Malformed("attribute value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    fn roundtrip(record: &Record<'_>) -> ParsedLine {
        let line = render_line(record);
        parse_line(&line).unwrap_or_else(|e| panic!("failed to parse {line:?}: {e}"))
    }

    #[test]
    fn test_render_shape() {
        let record = Record::new(Severity::Info, "app", "y", Attributes::new());
        let line = render_line(&record);
        assert!(line.starts_with('['));
        assert!(line.ends_with("] [INFO] [app] y"), "{line}");
    }

    #[test]
    fn test_render_attrs() {
        let record = Record::new(
            Severity::Error,
            "app",
            "z",
            attrs! { "code" => 7, "host" => "db-1", "ok" => false, "ratio" => 0.5 },
        );
        let line = render_line(&record);
        assert!(
            line.ends_with("[ERROR] [app] z {code=7, host=\"db-1\", ok=false, ratio=0.5}"),
            "{line}"
        );
    }

    #[test]
    fn test_roundtrip_plain() {
        let record = Record::new(Severity::Warn, "net", "disk almost full", Attributes::new());
        let parsed = roundtrip(&record);
        assert_eq!(parsed.severity, Severity::Warn);
        assert_eq!(parsed.context, "net");
        assert_eq!(parsed.message, "disk almost full");
        assert!(parsed.attrs.is_empty());
        assert_eq!(parsed.timestamp.timestamp_millis(), record.timestamp().timestamp_millis());
    }

    #[test]
    fn test_roundtrip_awkward_text() {
        let attrs = attrs! {
            "plain" => "a, b}",
            "with space" => "quote \" and \\ slash",
            "n" => -42,
            "f" => 1.0,
            "t" => true,
            "multi" => "line1\nline2",
        };
        let record = Record::new(
            Severity::Fatal,
            "weird]ctx\\",
            "msg {not attrs} \n second line ",
            attrs.clone(),
        );
        let parsed = roundtrip(&record);
        assert_eq!(parsed.severity, Severity::Fatal);
        assert_eq!(parsed.context, "weird]ctx\\");
        assert_eq!(parsed.message, "msg {not attrs} \n second line ");
        assert_eq!(parsed.attrs, attrs);
        assert!(!render_line(&record).contains('\n'));
    }

    #[test]
    fn test_roundtrip_every_severity() {
        for severity in Severity::ALL {
            let record = Record::new(severity, "c", "m", attrs! { "k" => 1 });
            assert_eq!(roundtrip(&record).severity, severity);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("hello").is_err());
        assert!(matches!(
            parse_line("[2026-01-01T00:00:00.000Z] [LOUD] [c] m"),
            Err(ParseError::Level(_))
        ));
        assert!(matches!(
            parse_line("[yesterday] [INFO] [c] m"),
            Err(ParseError::Timestamp(_))
        ));
        assert!(parse_line("[2026-01-01T00:00:00.000Z] [INFO] [c] m {k=}").is_err());
        assert!(parse_line("[2026-01-01T00:00:00.000Z] [INFO] [c] m {k=1} x").is_err());
    }
}
