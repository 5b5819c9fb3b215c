//! Per-module-instance registry slot

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use super::logger::Logger;
use super::logging::Logging;
use crate::config::{LoggingConfig, ReinitPolicy};
use crate::error::{LoggingError, LoggingResult};

/// Lifecycle of a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryState {
    Uninitialized,
    Active,
    Terminated,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistryState::Uninitialized => "uninitialized",
            RegistryState::Active => "active",
            RegistryState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

enum Slot {
    Uninitialized,
    Active(Logging),
    Terminated,
}

impl Slot {
    /// Notice a shutdown made directly through a `Logging` handle
    fn refresh(&mut self) {
        if matches!(self, Slot::Active(logging) if !logging.is_active()) {
            *self = Slot::Terminated;
        }
    }
}

/// Holds at most one active [`Logging`] instance
///
/// Tests and embedders create independent registries with
/// [`Registry::new`]; host bindings share [`Registry::global`].
///
/// ```text
/// Uninitialized --init--> Active --shutdown--> Terminated --init--> Active
/// ```
pub struct Registry {
    slot: Mutex<Slot>,
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("state", &self.state()).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Uninitialized),
        }
    }

    /// Process-wide registry used by the host bindings
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Initialize logging
    ///
    /// While an instance is active the config's [`ReinitPolicy`] decides:
    /// `Error` fails with [`LoggingError::AlreadyInitialized`], `Reuse`
    /// returns the active instance and ignores the new config. After a
    /// shutdown a fresh instance is built.
    pub fn init(&self, config: LoggingConfig) -> LoggingResult<Logging> {
        let mut slot = self.slot.lock();
        slot.refresh();
        if let Slot::Active(current) = &*slot {
            return match config.reinit {
                ReinitPolicy::Error => Err(LoggingError::AlreadyInitialized),
                ReinitPolicy::Reuse => Ok(current.clone()),
            };
        }

        let logging = Logging::init(config)?;
        *slot = Slot::Active(logging.clone());
        Ok(logging)
    }

    pub fn state(&self) -> RegistryState {
        let mut slot = self.slot.lock();
        slot.refresh();
        match &*slot {
            Slot::Uninitialized => RegistryState::Uninitialized,
            Slot::Active(_) => RegistryState::Active,
            Slot::Terminated => RegistryState::Terminated,
        }
    }

    /// The active instance, if any
    pub fn current(&self) -> Option<Logging> {
        let mut slot = self.slot.lock();
        slot.refresh();
        match &*slot {
            Slot::Active(logging) => Some(logging.clone()),
            _ => None,
        }
    }

    /// Logger from the active instance, or a detached no-op logger
    pub fn get_logger(&self, name: impl Into<Arc<str>>) -> Logger {
        match self.current() {
            Some(logging) => logging.get_logger(name),
            None => Logger::detached(name),
        }
    }

    /// Shut down the active instance
    ///
    /// Returns whether there was one. Loggers handed out earlier become
    /// no-ops.
    pub fn shutdown(&self) -> bool {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Terminated) {
            Slot::Active(logging) => {
                let was_active = logging.is_active();
                logging.shutdown();
                was_active
            }
            Slot::Uninitialized => {
                *slot = Slot::Uninitialized;
                false
            }
            Slot::Terminated => false,
        }
    }

    /// Whether `logging` is the instance this registry holds
    pub fn holds(&self, logging: &Logging) -> bool {
        matches!(&*self.slot.lock(), Slot::Active(current) if current.ptr_eq(logging))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkConfig;
    use crate::types::Severity;

    fn memory_config() -> LoggingConfig {
        LoggingConfig::default().with_sinks(vec![SinkConfig::memory()])
    }

    #[test]
    fn test_state_machine() {
        let registry = Registry::new();
        assert_eq!(registry.state(), RegistryState::Uninitialized);
        assert!(!registry.shutdown());
        assert_eq!(registry.state(), RegistryState::Uninitialized);

        let first = registry.init(memory_config()).unwrap();
        assert_eq!(registry.state(), RegistryState::Active);
        assert!(registry.holds(&first));

        assert!(registry.shutdown());
        assert_eq!(registry.state(), RegistryState::Terminated);
        assert!(!first.is_active());
        assert!(!registry.shutdown());

        let second = registry.init(memory_config()).unwrap();
        assert_eq!(registry.state(), RegistryState::Active);
        assert!(!second.ptr_eq(&first));
    }

    #[test]
    fn test_reinit_error_policy() {
        let registry = Registry::new();
        let first = registry.init(memory_config()).unwrap();
        let result = registry.init(memory_config().with_level(Severity::Trace));
        assert!(matches!(result, Err(LoggingError::AlreadyInitialized)));
        assert!(registry.holds(&first));
        assert_eq!(first.level(), Some(Severity::Info));
    }

    #[test]
    fn test_reinit_reuse_policy() {
        let registry = Registry::new();
        let first = registry.init(memory_config()).unwrap();
        let again = registry
            .init(
                memory_config()
                    .with_level(Severity::Trace)
                    .with_reinit(ReinitPolicy::Reuse),
            )
            .unwrap();
        assert!(again.ptr_eq(&first));
        // The second config is ignored
        assert_eq!(again.level(), Some(Severity::Info));
    }

    #[test]
    fn test_direct_shutdown_is_noticed() {
        let registry = Registry::new();
        let logging = registry.init(memory_config()).unwrap();
        logging.shutdown();
        assert_eq!(registry.state(), RegistryState::Terminated);
        assert!(registry.current().is_none());
        assert!(registry.init(memory_config()).is_ok());
    }

    #[test]
    fn test_get_logger_without_instance() {
        let registry = Registry::new();
        let logger = registry.get_logger("early");
        assert!(!logger.enabled(Severity::Fatal));
        logger.error("nowhere to go");

        registry.init(memory_config()).unwrap();
        assert!(registry.get_logger("late").enabled(Severity::Info));
    }

    #[test]
    fn test_failed_init_leaves_slot_untouched() {
        let registry = Registry::new();
        let result = registry.init(LoggingConfig::default().with_sinks(vec![SinkConfig::network("")]));
        assert!(matches!(result, Err(LoggingError::Config(_))));
        assert_eq!(registry.state(), RegistryState::Uninitialized);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RegistryState::Terminated.to_string(), "terminated");
    }
}
