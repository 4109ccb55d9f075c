//! Plain-text file channel.
//!
//! Each record is one line `[date] [level] [module][action]: message`; error
//! messages continue with a `[trace]` marker line and the full trace. Batches
//! are appended to the live file.

use crate::config::{FileChannelConfig, FileChannelOptions};
use crate::error::Result;
use crate::grouping::Grouped;
use crate::sink::{BatchFormat, BufferedSink};
use crate::types::{GroupKey, LogEntry, LogLevel, Message};

/// A rendered text line with the attributes it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    /// The full rendered text, possibly spanning several lines.
    pub content: String,
    /// Severity level
    pub level: LogLevel,
    /// Formatted date
    pub date: String,
    /// Module
    pub module: String,
    /// Action
    pub action: String,
    /// Trace of an error message
    pub stack: Option<String>,
}

impl Grouped for TextRecord {
    fn attribute(&self, key: GroupKey) -> &str {
        match key {
            GroupKey::Level => self.level.as_str(),
            GroupKey::Module => &self.module,
            GroupKey::Action => &self.action,
        }
    }
}

/// Newline-joined text lines, appended.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormat;

impl BatchFormat for TextFormat {
    type Record = TextRecord;

    fn default_extension(&self) -> &'static str {
        "log"
    }

    fn render(&self, entry: &LogEntry, date: String) -> TextRecord {
        let mut content = format!(
            "[{date}] [{}] [{}][{}]: ",
            entry.level, entry.module, entry.action
        );

        let stack = match &entry.message {
            Message::Error { description, stack } => {
                content.push_str(description);
                content.push_str("\n[trace]\n");
                content.push_str(stack);
                Some(stack.clone())
            }
            other => {
                content.push_str(&other.text());
                None
            }
        };

        TextRecord {
            content,
            level: entry.level,
            date,
            module: entry.module.clone(),
            action: entry.action.clone(),
            stack,
        }
    }

    fn encode(&self, records: &[TextRecord]) -> Result<Vec<u8>> {
        let mut out = String::new();
        for record in records {
            out.push_str(&record.content);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

/// Buffered channel writing text lines to files.
pub type FileChannel = BufferedSink<TextFormat>;

impl BufferedSink<TextFormat> {
    /// Creates a text file channel named `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options resolve to an invalid configuration.
    pub fn new(options: FileChannelOptions) -> Result<Self> {
        Self::with_name("file", options)
    }

    /// Creates a text file channel with a custom channel name.
    ///
    /// # Errors
    ///
    /// Returns an error if the options resolve to an invalid configuration.
    pub fn with_name(name: impl Into<String>, options: FileChannelOptions) -> Result<Self> {
        let base = FileChannelConfig {
            extension: TextFormat.default_extension().to_string(),
            ..FileChannelConfig::default()
        };
        let config = FileChannelConfig::resolve_over(options, base)?;
        Ok(Self::with_format(name, config, TextFormat))
    }
}
