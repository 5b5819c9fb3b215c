//! Message model: severities, records and attributes
//!
//! This module contains the types shared by sinks, the dispatcher and the
//! logger handles.

mod severity;
mod attrs;
mod record;

pub use severity::Severity;
pub use attrs::{AttrValue, Attributes};
pub use record::{MessageSource, OwnedRecord, Record};
