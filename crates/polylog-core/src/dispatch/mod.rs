//! Record dispatch
//!
//! The dispatcher owns the registered sinks and writes each record to every
//! sink whose threshold it passes, in registration order.

mod dispatcher;
mod report;

pub use dispatcher::{Dispatcher, DiagnosticsFn, PendingDiagnostics, SinkId};
pub use report::{DispatchOutcome, FailureReport, SinkReport};
