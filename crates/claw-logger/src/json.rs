//! JSON file channel.
//!
//! Persists records as `{ "messages": [ ... ] }`, pretty-printed with two-space
//! indentation. Ungrouped files are read, extended and rewritten on every
//! flush; grouped files are replaced with the group's batch.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{FileChannelConfig, FileChannelOptions};
use crate::error::Result;
use crate::grouping::Grouped;
use crate::sink::{BatchFormat, BufferedSink, WriteMode};
use crate::types::{GroupKey, LogEntry, LogLevel};

/// One persisted JSON record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRecord {
    /// The message payload (error messages store their description).
    pub content: serde_json::Value,
    /// Severity level
    pub level: LogLevel,
    /// Formatted date
    pub date: String,
    /// Module
    pub module: String,
    /// Action
    pub action: String,
    /// Trace lines of an error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
    /// Structured context of the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Grouped for JsonRecord {
    fn attribute(&self, key: GroupKey) -> &str {
        match key {
            GroupKey::Level => self.level.as_str(),
            GroupKey::Module => &self.module,
            GroupKey::Action => &self.action,
        }
    }
}

/// On-disk document shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    messages: Vec<serde_json::Value>,
}

/// Structured documents, merged or replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
    fn to_bytes(document: &Document) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(document)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn append(document: &mut Document, records: &[JsonRecord]) -> Result<()> {
        for record in records {
            document.messages.push(serde_json::to_value(record)?);
        }
        Ok(())
    }
}

impl BatchFormat for JsonFormat {
    type Record = JsonRecord;

    fn default_extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, entry: &LogEntry, date: String) -> JsonRecord {
        JsonRecord {
            content: entry.message.to_value(),
            level: entry.level,
            date,
            module: entry.module.clone(),
            action: entry.action.clone(),
            stack: entry
                .message
                .stack()
                .map(|stack| stack.lines().map(str::to_string).collect()),
            context: entry.context.clone(),
        }
    }

    fn write_mode(&self, grouped: bool) -> WriteMode {
        if grouped {
            WriteMode::Replace
        } else {
            WriteMode::Merge
        }
    }

    fn encode(&self, records: &[JsonRecord]) -> Result<Vec<u8>> {
        let mut document = Document::default();
        Self::append(&mut document, records)?;
        Self::to_bytes(&document)
    }

    fn merge(&self, existing: Option<&[u8]>, records: &[JsonRecord]) -> Result<Vec<u8>> {
        let mut document = match existing {
            Some(bytes) => serde_json::from_slice::<Document>(bytes).unwrap_or_else(|e| {
                warn!(error = %e, "error reading log file, reinitializing");
                Document::default()
            }),
            None => Document::default(),
        };
        Self::append(&mut document, records)?;
        Self::to_bytes(&document)
    }
}

/// Buffered channel writing JSON documents.
pub type JsonFileChannel = BufferedSink<JsonFormat>;

impl BufferedSink<JsonFormat> {
    /// Creates a JSON file channel named `fileJson`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options resolve to an invalid configuration.
    pub fn new(options: FileChannelOptions) -> Result<Self> {
        Self::with_name("fileJson", options)
    }

    /// Creates a JSON file channel with a custom channel name.
    ///
    /// The extension defaults to `json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options resolve to an invalid configuration.
    pub fn with_name(name: impl Into<String>, options: FileChannelOptions) -> Result<Self> {
        let base = FileChannelConfig {
            extension: JsonFormat.default_extension().to_string(),
            ..FileChannelConfig::default()
        };
        let config = FileChannelConfig::resolve_over(options, base)?;
        Ok(Self::with_format(name, config, JsonFormat))
    }
}
