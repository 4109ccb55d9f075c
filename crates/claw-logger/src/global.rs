//! Process-wide logger handle.
//!
//! Code that cannot carry a [`Logger`] around installs one here once at
//! startup and tears it down with [`shutdown`] before exit.

use std::panic;

use once_cell::sync::OnceCell;

use crate::error::{LogError, Result};
use crate::logger::Logger;
use crate::types::Message;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Installs the process-wide logger.
///
/// # Errors
///
/// Returns [`LogError::AlreadyInitialized`] if a logger is already installed.
pub fn init(logger: Logger) -> Result<&'static Logger> {
    LOGGER
        .set(logger)
        .map_err(|_| LogError::AlreadyInitialized)?;
    LOGGER.get().ok_or(LogError::NotInitialized)
}

/// Returns the process-wide logger, if installed.
#[must_use]
pub fn logger() -> Option<&'static Logger> {
    LOGGER.get()
}

/// Flushes and stops every channel of the process-wide logger.
///
/// # Errors
///
/// Returns [`LogError::NotInitialized`] if no logger is installed, or the
/// first channel error.
pub async fn shutdown() -> Result<()> {
    logger().ok_or(LogError::NotInitialized)?.shutdown().await
}

/// Routes panics through the process-wide logger.
///
/// The installed hook logs an `error` entry under module `app`, action
/// `panic`, then hands the panic to the previously installed hook. Panics
/// raised before [`init`] only reach the previous hook.
pub fn capture_panics() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Some(logger) = logger() {
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_string());
            let location = info
                .location()
                .map(|l| format!("at {}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_default();
            drop(logger.error("app", "panic", Message::error(payload, location)));
        }
        previous(info);
    }));
}
