//! Logging lifecycle and logger handles
//!
//! - `Registry`: slot holding at most one active instance
//! - `Logging`: an initialized core (dispatcher plus sinks)
//! - `Logger`: per-context handle with leveled operations

mod logging;
mod logger;
mod slot;

pub use logging::Logging;
pub use logger::Logger;
pub use slot::{Registry, RegistryState};
