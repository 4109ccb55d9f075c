//! The channel contract.
//!
//! A [`Channel`] is one independent log sink. The dispatcher hands every entry
//! to every registered channel; each channel applies its own policy.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::LogEntry;

/// Work a channel still has to do after accepting an entry.
///
/// `None` means the entry was fully handled inside [`Channel::log`].
pub type Pending = Option<BoxFuture<'static, ()>>;

/// Trait for log channels.
pub trait Channel: Send + Sync {
    /// Unique name used for lookup.
    fn name(&self) -> &str;

    /// Optional human-readable description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Returns true if the channel writes to a terminal.
    ///
    /// Non-terminal channels receive text messages with ANSI styling removed.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Logs an entry.
    ///
    /// Never fails and never blocks on I/O. Channels that need follow-up work,
    /// such as a buffer flush, return it as a pending future.
    fn log(&self, entry: &LogEntry) -> Pending;

    /// Persists anything still held in memory, ignoring flush thresholds.
    fn flush(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Stops background work and persists anything still held in memory.
    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        self.flush()
    }
}

/// A boxed channel for dynamic dispatch.
pub type BoxedChannel = Box<dyn Channel>;

impl Channel for BoxedChannel {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn description(&self) -> Option<&str> {
        (**self).description()
    }

    fn is_terminal(&self) -> bool {
        (**self).is_terminal()
    }

    fn log(&self, entry: &LogEntry) -> Pending {
        (**self).log(entry)
    }

    fn flush(&self) -> BoxFuture<'_, Result<()>> {
        (**self).flush()
    }

    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        (**self).shutdown()
    }
}
