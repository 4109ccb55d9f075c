//! Channel configuration.
//!
//! Every channel carries a [`ChannelPolicy`] deciding which entries it accepts.
//! File channels are configured through [`FileChannelOptions`], a partial
//! override that is merged over the documented defaults once, producing an
//! immutable [`FileChannelConfig`].

use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use serde::Deserialize;

use crate::error::{LogError, Result};
use crate::types::{GroupKey, LogEntry, LogLevel};

/// Default interval between periodic flush checks, and the staleness bound.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);

/// Default maximum size of a live log file (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of buffered messages that triggers a flush.
pub const DEFAULT_MAX_MESSAGES_TO_WRITE: usize = 100;

/// A predicate deciding whether an entry should be logged.
#[derive(Clone)]
pub struct EntryFilter(Arc<dyn Fn(&LogEntry) -> bool + Send + Sync>);

impl EntryFilter {
    /// Wraps a predicate.
    pub fn new(predicate: impl Fn(&LogEntry) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        (self.0)(entry)
    }
}

impl fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntryFilter(..)")
    }
}

/// Per-channel accept policy: a level allow-list plus an optional predicate.
#[derive(Debug, Clone, Default)]
pub struct ChannelPolicy {
    /// Allowed levels (empty means all levels).
    pub levels: Vec<LogLevel>,
    /// Extra predicate; `None` accepts everything.
    pub filter: Option<EntryFilter>,
}

impl ChannelPolicy {
    /// Creates a policy accepting every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the policy to the given levels.
    #[must_use]
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Sets the filter predicate.
    #[must_use]
    pub fn with_filter(
        mut self,
        predicate: impl Fn(&LogEntry) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(EntryFilter::new(predicate));
        self
    }

    /// Returns true if the entry passes the level allow-list and the filter.
    #[must_use]
    pub fn should_log(&self, entry: &LogEntry) -> bool {
        if !self.levels.is_empty() && !self.levels.contains(&entry.level) {
            return false;
        }

        self.filter.as_ref().is_none_or(|filter| filter.matches(entry))
    }
}

/// File-name time bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chunk {
    /// One file under the configured name.
    #[default]
    Single,
    /// One file per day.
    Daily,
    /// One file per hour.
    Hourly,
}

impl Chunk {
    /// Returns the base file name (without extension) at `now`.
    #[must_use]
    pub fn file_name<Tz>(&self, name: &str, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self {
            Self::Single => name.to_string(),
            Self::Daily => format_time(now, "%d-%m-%Y"),
            Self::Hourly => format_time(now, "%d-%m-%Y-%H"),
        }
    }
}

/// Date and time patterns (`strftime` syntax) used to stamp file records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DateFormat {
    /// Date pattern.
    pub date: String,
    /// Time pattern.
    pub time: String,
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            date: "%d-%m-%Y".to_string(),
            time: "%H:%M:%S".to_string(),
        }
    }
}

impl DateFormat {
    /// Returns the combined `date time` pattern.
    #[must_use]
    pub fn pattern(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}

/// Formats a timestamp with a `strftime` pattern.
///
/// Patterns are validated when a configuration is resolved; an invalid pattern
/// reaching this point yields whatever was rendered before the bad specifier.
pub fn format_time<Tz>(time: &DateTime<Tz>, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    let _ = write!(out, "{}", time.format(pattern));
    out
}

fn validate_pattern(field: &str, pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(LogError::InvalidConfig(format!(
            "{field} has an invalid date pattern: {pattern:?}"
        )));
    }
    Ok(())
}

/// Partial file channel configuration.
///
/// Every unset field falls back to the channel's defaults when resolved.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileChannelOptions {
    /// Allowed levels (empty means all).
    pub levels: Option<Vec<LogLevel>>,
    /// Extra accept predicate.
    #[serde(skip)]
    pub filter: Option<EntryFilter>,
    /// Record date/time patterns.
    pub date_format: Option<DateFormat>,
    /// Directory that receives the log files.
    pub storage_path: Option<PathBuf>,
    /// Base file name, used with [`Chunk::Single`].
    pub name: Option<String>,
    /// File-name time bucketing.
    pub chunk: Option<Chunk>,
    /// Whether oversized files are rotated.
    pub rotate: Option<bool>,
    /// File extension, without the dot.
    pub extension: Option<String>,
    /// Pattern inserted in rotated file names.
    pub rotate_file_name: Option<String>,
    /// Size in bytes at which the live file is rotated.
    pub max_file_size: Option<u64>,
    /// Buffered message count that triggers a flush.
    pub max_messages_to_write: Option<usize>,
    /// Ordered attributes partitioning output into subdirectories.
    pub group_by: Option<Vec<GroupKey>>,
    /// Flush interval in milliseconds.
    pub flush_interval: Option<u64>,
}

impl FileChannelOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage directory.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Sets the base file name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the allowed levels.
    #[must_use]
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    /// Sets the filter predicate.
    #[must_use]
    pub fn with_filter(
        mut self,
        predicate: impl Fn(&LogEntry) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(EntryFilter::new(predicate));
        self
    }

    /// Sets the record date format.
    #[must_use]
    pub fn with_date_format(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.date_format = Some(DateFormat {
            date: date.into(),
            time: time.into(),
        });
        self
    }

    /// Sets the chunk mode.
    #[must_use]
    pub const fn with_chunk(mut self, chunk: Chunk) -> Self {
        self.chunk = Some(chunk);
        self
    }

    /// Enables or disables rotation.
    #[must_use]
    pub const fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = Some(rotate);
        self
    }

    /// Sets the file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Sets the rotated-file pattern.
    #[must_use]
    pub fn with_rotate_file_name(mut self, pattern: impl Into<String>) -> Self {
        self.rotate_file_name = Some(pattern.into());
        self
    }

    /// Sets the rotation size threshold.
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = Some(size);
        self
    }

    /// Sets the flush threshold.
    #[must_use]
    pub const fn with_max_messages_to_write(mut self, count: usize) -> Self {
        self.max_messages_to_write = Some(count);
        self
    }

    /// Sets the grouping attributes.
    #[must_use]
    pub fn with_group_by(mut self, keys: impl IntoIterator<Item = GroupKey>) -> Self {
        self.group_by = Some(keys.into_iter().collect());
        self
    }

    /// Sets the flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// Resolved, immutable file channel configuration.
#[derive(Debug, Clone)]
pub struct FileChannelConfig {
    /// Accept policy.
    pub policy: ChannelPolicy,
    /// Record date/time patterns.
    pub date_format: DateFormat,
    /// Directory that receives the log files.
    pub storage_path: PathBuf,
    /// Base file name.
    pub name: String,
    /// File-name time bucketing.
    pub chunk: Chunk,
    /// Whether oversized files are rotated.
    pub rotate: bool,
    /// File extension, without the dot.
    pub extension: String,
    /// Pattern inserted in rotated file names.
    pub rotate_file_name: String,
    /// Size in bytes at which the live file is rotated.
    pub max_file_size: u64,
    /// Buffered message count that triggers a flush.
    pub max_messages_to_write: usize,
    /// Ordered grouping attributes.
    pub group_by: Vec<GroupKey>,
    /// Periodic flush interval and staleness bound.
    pub flush_interval: Duration,
}

impl Default for FileChannelConfig {
    fn default() -> Self {
        Self {
            policy: ChannelPolicy::default(),
            date_format: DateFormat::default(),
            storage_path: std::env::current_dir()
                .unwrap_or_default()
                .join("storage")
                .join("logs"),
            name: "app".to_string(),
            chunk: Chunk::Single,
            rotate: true,
            extension: "log".to_string(),
            rotate_file_name: "%d-%m-%Y".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_messages_to_write: DEFAULT_MAX_MESSAGES_TO_WRITE,
            group_by: Vec::new(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl FileChannelConfig {
    /// Resolves options over the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration is invalid.
    pub fn resolve(options: FileChannelOptions) -> Result<Self> {
        Self::resolve_over(options, Self::default())
    }

    /// Resolves options over the given base configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration is invalid.
    pub fn resolve_over(options: FileChannelOptions, base: Self) -> Result<Self> {
        let config = Self {
            policy: ChannelPolicy {
                levels: options.levels.unwrap_or(base.policy.levels),
                filter: options.filter.or(base.policy.filter),
            },
            date_format: options.date_format.unwrap_or(base.date_format),
            storage_path: options.storage_path.unwrap_or(base.storage_path),
            name: options.name.unwrap_or(base.name),
            chunk: options.chunk.unwrap_or(base.chunk),
            rotate: options.rotate.unwrap_or(base.rotate),
            extension: options.extension.unwrap_or(base.extension),
            rotate_file_name: options.rotate_file_name.unwrap_or(base.rotate_file_name),
            max_file_size: options.max_file_size.unwrap_or(base.max_file_size),
            max_messages_to_write: options
                .max_messages_to_write
                .unwrap_or(base.max_messages_to_write),
            group_by: options.group_by.unwrap_or(base.group_by),
            flush_interval: options
                .flush_interval
                .map_or(base.flush_interval, Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LogError::InvalidConfig("name must not be empty".to_string()));
        }
        if self.extension.trim().is_empty() {
            return Err(LogError::InvalidConfig(
                "extension must not be empty".to_string(),
            ));
        }
        if self.max_messages_to_write == 0 {
            return Err(LogError::InvalidConfig(
                "maxMessagesToWrite must be at least 1".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(LogError::InvalidConfig(
                "flushInterval must be positive".to_string(),
            ));
        }
        validate_pattern("dateFormat.date", &self.date_format.date)?;
        validate_pattern("dateFormat.time", &self.date_format.time)?;
        validate_pattern("rotateFileName", &self.rotate_file_name)?;
        Ok(())
    }

    /// Returns true when output is partitioned by entry attributes.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }
}
