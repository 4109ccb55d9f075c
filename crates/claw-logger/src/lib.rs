//! # claw-logger
//!
//! Multi-channel structured logging.
//!
//! This crate provides:
//!
//! - [`Logger`] — Dispatcher broadcasting entries to every registered channel
//! - [`Channel`] — Trait implemented by every log sink
//! - [`ConsoleChannel`] — Colored, iconified terminal output
//! - [`FileChannel`] — Buffered text lines with rotation and grouping
//! - [`JsonFileChannel`] — Buffered JSON documents with rotation and grouping
//! - [`FileChannelOptions`] — Partial overrides resolved into a [`FileChannelConfig`]
//! - [`global`] — Optional process-wide logger and panic capture
//!
//! ## Example
//!
//! ```rust,no_run
//! use claw_logger::{ConsoleChannel, FileChannel, FileChannelOptions, GroupKey, LogLevel, Logger};
//!
//! # async fn run() -> claw_logger::Result<()> {
//! let file = FileChannel::new(
//!     FileChannelOptions::new()
//!         .with_storage_path("/var/log/app")
//!         .with_levels([LogLevel::Warn, LogLevel::Error])
//!         .with_group_by([GroupKey::Module]),
//! )?
//! .started();
//!
//! let logger = Logger::new();
//! logger.add_channel(ConsoleChannel::new()).add_channel(file);
//!
//! logger.info("api", "boot", "listening on :8080");
//! logger.error("db", "connect", "connection refused");
//!
//! logger.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod console;
pub mod error;
pub mod file;
pub mod global;
pub mod grouping;
pub mod json;
pub mod logger;
pub mod rotation;
pub mod sink;
pub mod traits;
pub mod types;

// Re-export main types
pub use config::{
    ChannelPolicy, Chunk, DateFormat, EntryFilter, FileChannelConfig, FileChannelOptions,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_MESSAGES_TO_WRITE,
};
pub use console::ConsoleChannel;
pub use error::{LogError, Result};
pub use file::{FileChannel, TextFormat, TextRecord};
pub use json::{JsonFileChannel, JsonFormat, JsonRecord};
pub use logger::{clear_message, Dispatched, Logger};
pub use sink::{BatchFormat, BufferedSink, FlushOutcome, SkipReason, WriteMode};
pub use traits::{BoxedChannel, Channel, Pending};
pub use types::{GroupKey, LogEntry, LogEntryBuilder, LogLevel, Message};
