//! The log dispatcher.
//!
//! [`Logger`] owns an ordered list of channels and broadcasts every entry to
//! each of them in registration order. Text messages are stripped of ANSI
//! styling before they reach a non-terminal channel.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Result;
use crate::traits::Channel;
use crate::types::{LogEntry, LogLevel, Message};

/// Matches ANSI SGR escape sequences.
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b[^m]*?m").unwrap_or_else(|_| unreachable!()));

/// Removes terminal styling from text; other messages pass through unchanged.
#[must_use]
pub fn clear_message(message: &Message) -> Message {
    match message {
        Message::Text(text) => Message::Text(ANSI_ESCAPE.replace_all(text, "").into_owned()),
        other => other.clone(),
    }
}

enum Task {
    Spawned(JoinHandle<()>),
    Deferred(BoxFuture<'static, ()>),
}

/// Follow-up work issued by one broadcast.
///
/// Work is spawned on the current tokio runtime when there is one, so dropping
/// this value does not cancel it. Without a runtime the work only runs if the
/// value is awaited through [`settled`](Self::settled).
pub struct Dispatched {
    tasks: Vec<Task>,
}

impl Dispatched {
    /// Number of channels that returned follow-up work.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until every channel's follow-up work has finished.
    pub async fn settled(self) {
        let waits = self.tasks.into_iter().map(|task| -> BoxFuture<'static, ()> {
            match task {
                Task::Spawned(handle) => Box::pin(async move {
                    let _ = handle.await;
                }),
                Task::Deferred(future) => future,
            }
        });
        join_all(waits).await;
    }
}

/// Broadcasts log entries to registered channels.
#[derive(Default)]
pub struct Logger {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
}

impl Logger {
    /// Creates a logger with no channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a logger with the given channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn Channel>>) -> Self {
        Self {
            channels: RwLock::new(channels),
        }
    }

    /// Registers a channel after the existing ones.
    pub fn add_channel(&self, channel: impl Channel + 'static) -> &Self {
        self.add_shared(Arc::new(channel))
    }

    /// Registers an already shared channel after the existing ones.
    pub fn add_shared(&self, channel: Arc<dyn Channel>) -> &Self {
        self.channels.write().push(channel);
        self
    }

    /// Replaces every registered channel.
    pub fn set_channels(&self, channels: Vec<Arc<dyn Channel>>) -> &Self {
        *self.channels.write() = channels;
        self
    }

    /// Returns the first channel registered under `name`.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels
            .read()
            .iter()
            .find(|channel| channel.name() == name)
            .cloned()
    }

    /// Returns the number of registered channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Broadcasts an entry to every channel.
    pub fn log_entry(&self, entry: &LogEntry) -> Dispatched {
        let channels: Vec<Arc<dyn Channel>> = self.channels.read().clone();
        let runtime = tokio::runtime::Handle::try_current().ok();
        let mut cleared: Option<LogEntry> = None;
        let mut tasks = Vec::new();

        for channel in channels {
            let pending = if channel.is_terminal() {
                channel.log(entry)
            } else {
                let clean = cleared.get_or_insert_with(|| LogEntry {
                    message: clear_message(&entry.message),
                    ..entry.clone()
                });
                channel.log(clean)
            };

            if let Some(future) = pending {
                tasks.push(match &runtime {
                    Some(handle) => Task::Spawned(handle.spawn(future)),
                    None => Task::Deferred(future),
                });
            }
        }

        Dispatched { tasks }
    }

    /// Builds an entry from its parts and broadcasts it.
    pub fn log(
        &self,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
        level: LogLevel,
    ) -> Dispatched {
        self.log_entry(&LogEntry::new(level, module, action, message))
    }

    /// Logs at debug level.
    pub fn debug(
        &self,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
    ) -> Dispatched {
        self.log(module, action, message, LogLevel::Debug)
    }

    /// Logs at info level.
    pub fn info(
        &self,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
    ) -> Dispatched {
        self.log(module, action, message, LogLevel::Info)
    }

    /// Logs at warn level.
    pub fn warn(
        &self,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
    ) -> Dispatched {
        self.log(module, action, message, LogLevel::Warn)
    }

    /// Logs at error level.
    pub fn error(
        &self,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
    ) -> Dispatched {
        self.log(module, action, message, LogLevel::Error)
    }

    /// Logs at success level.
    pub fn success(
        &self,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
    ) -> Dispatched {
        self.log(module, action, message, LogLevel::Success)
    }

    /// Flushes every channel, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns the first channel error.
    pub async fn flush(&self) -> Result<()> {
        let channels: Vec<Arc<dyn Channel>> = self.channels.read().clone();
        let mut first_error = None;
        for channel in channels {
            if let Err(e) = channel.flush().await {
                warn!(channel = %channel.name(), error = %e, "failed to flush log channel");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stops every channel's background work and flushes what remains.
    ///
    /// # Errors
    ///
    /// Returns the first channel error.
    pub async fn shutdown(&self) -> Result<()> {
        let channels: Vec<Arc<dyn Channel>> = self.channels.read().clone();
        let mut first_error = None;
        for channel in channels {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = %channel.name(), error = %e, "failed to shut down log channel");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
