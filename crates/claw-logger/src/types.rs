//! Core types for log entries.
//!
//! This module provides:
//! - [`LogLevel`] — The five levels a channel can accept
//! - [`Message`] — The payload of an entry (text, error or structured value)
//! - [`LogEntry`] — One structured log record
//! - [`GroupKey`] — Entry attributes usable to partition file output

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Log levels understood by every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning conditions
    Warn,
    /// Error conditions
    Error,
    /// Successful completion of an operation
    Success,
}

impl LogLevel {
    /// All levels, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Success,
    ];

    /// Returns the string representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload carried by a [`LogEntry`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Plain text, possibly containing terminal styling.
    Text(String),
    /// An error with its description and full trace.
    Error {
        /// The error's own message.
        description: String,
        /// The trace text, one frame or cause per line.
        stack: String,
    },
    /// Any structured value.
    Structured(serde_json::Value),
}

impl Message {
    /// Builds an error message from explicit description and trace text.
    #[must_use]
    pub fn error(description: impl Into<String>, stack: impl Into<String>) -> Self {
        Self::Error {
            description: description.into(),
            stack: stack.into(),
        }
    }

    /// Builds an error message from any error value.
    ///
    /// The trace is the error's `Debug` form followed by one `caused by:` line
    /// per entry of its source chain.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut stack = format!("{err:?}");
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\ncaused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Error {
            description: err.to_string(),
            stack,
        }
    }

    /// Returns true when the payload is a structured (non-text) value.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Returns the trace of an error message.
    #[must_use]
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::Error { stack, .. } => Some(stack),
            _ => None,
        }
    }

    /// Returns the single-line text form of the payload.
    ///
    /// Errors render as their description, structured values as compact JSON.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Error { description, .. } => description.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }

    /// Returns the payload as a JSON value for structured persistence.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Error { description, .. } => serde_json::Value::String(description.clone()),
            Self::Structured(value) => value.clone(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for Message {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }
}

impl From<&std::io::Error> for Message {
    fn from(err: &std::io::Error) -> Self {
        Self::from_error(err)
    }
}

impl From<&LogError> for Message {
    fn from(err: &LogError) -> Self {
        Self::from_error(err)
    }
}

/// Entry attributes that can partition grouped file output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    /// Partition by level name
    Level,
    /// Partition by module
    Module,
    /// Partition by action
    Action,
}

/// A structured log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Severity level
    pub level: LogLevel,
    /// Module that produced the entry
    pub module: String,
    /// Action within the module
    pub action: String,
    /// The payload
    pub message: Message,
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
    /// Optional structured context
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(
        level: LogLevel,
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<Message>,
    ) -> Self {
        Self {
            level,
            module: module.into(),
            action: action.into(),
            message: message.into(),
            timestamp: Utc::now(),
            context: None,
        }
    }

    /// Creates a new log entry builder.
    #[must_use]
    pub fn builder() -> LogEntryBuilder {
        LogEntryBuilder::default()
    }

    /// Returns the value of the given grouping attribute.
    #[must_use]
    pub fn attribute(&self, key: GroupKey) -> &str {
        match key {
            GroupKey::Level => self.level.as_str(),
            GroupKey::Module => &self.module,
            GroupKey::Action => &self.action,
        }
    }
}

/// Builder for constructing log entries.
///
/// Level defaults to [`LogLevel::Info`], the timestamp to now and the message
/// to empty text; module and action are required.
#[derive(Debug, Default)]
pub struct LogEntryBuilder {
    level: Option<LogLevel>,
    module: Option<String>,
    action: Option<String>,
    message: Option<Message>,
    timestamp: Option<DateTime<Utc>>,
    context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl LogEntryBuilder {
    /// Sets the log level.
    #[must_use]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the module.
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<Message>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Adds a context field.
    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// Builds the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the module or action is not set.
    pub fn build(self) -> Result<LogEntry, LogError> {
        let module = self.module.ok_or(LogError::MissingField("module"))?;
        let action = self.action.ok_or(LogError::MissingField("action"))?;

        Ok(LogEntry {
            level: self.level.unwrap_or(LogLevel::Info),
            module,
            action,
            message: self.message.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            context: self.context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(LogLevel::Debug, "debug")]
    #[test_case(LogLevel::Info, "info")]
    #[test_case(LogLevel::Warn, "warn")]
    #[test_case(LogLevel::Error, "error")]
    #[test_case(LogLevel::Success, "success")]
    fn log_level_as_str(level: LogLevel, expected: &str) {
        assert_eq!(level.as_str(), expected);
        assert_eq!(level.to_string(), expected);
    }

    #[test]
    fn log_level_serialization() {
        let json = serde_json::to_string(&LogLevel::Success).map_err(|e| e.to_string());
        assert_eq!(json, Ok("\"success\"".to_string()));

        let parsed: Result<LogLevel, _> =
            serde_json::from_str("\"warn\"").map_err(|e| e.to_string());
        assert_eq!(parsed, Ok(LogLevel::Warn));
    }

    #[test]
    fn builder_defaults_level_to_info() {
        let entry = LogEntry::builder().module("app").action("boot").build();
        assert!(entry.is_ok());
        if let Ok(entry) = entry {
            assert_eq!(entry.level, LogLevel::Info);
            assert_eq!(entry.message, Message::Text(String::new()));
            assert!(entry.context.is_none());
        }
    }

    #[test]
    fn builder_missing_module_fails() {
        let result = LogEntry::builder().action("boot").build();
        assert!(matches!(result, Err(LogError::MissingField("module"))));

        let result = LogEntry::builder().module("app").build();
        assert!(matches!(result, Err(LogError::MissingField("action"))));
    }

    #[test]
    fn builder_collects_context() {
        let entry = LogEntry::builder()
            .module("http")
            .action("request")
            .level(LogLevel::Warn)
            .message("slow")
            .context("elapsed_ms", serde_json::json!(1500))
            .context("route", serde_json::json!("/users"))
            .build();

        assert!(entry.is_ok());
        if let Ok(entry) = entry {
            let context = entry.context.unwrap_or_default();
            assert_eq!(context.len(), 2);
            assert_eq!(context["elapsed_ms"], serde_json::json!(1500));
        }
    }

    #[test]
    fn entry_attributes() {
        let entry = LogEntry::new(LogLevel::Error, "db", "connect", "refused");
        assert_eq!(entry.attribute(GroupKey::Level), "error");
        assert_eq!(entry.attribute(GroupKey::Module), "db");
        assert_eq!(entry.attribute(GroupKey::Action), "connect");
    }

    #[test]
    fn message_from_json_string_is_text() {
        let msg = Message::from(serde_json::json!("hello"));
        assert_eq!(msg, Message::Text("hello".to_string()));
        assert!(!msg.is_structured());

        let msg = Message::from(serde_json::json!({"id": 7}));
        assert!(msg.is_structured());
        assert_eq!(msg.text(), r#"{"id":7}"#);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn message_from_error_includes_source_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let msg = Message::from_error(&err);

        assert_eq!(msg.text(), "outer failure");
        let stack = msg.stack().unwrap_or_default();
        assert!(stack.contains("Outer"));
        assert!(stack.contains("caused by: disk gone"));
    }

    #[test]
    fn message_to_value() {
        assert_eq!(Message::from("x").to_value(), serde_json::json!("x"));
        assert_eq!(
            Message::error("boom", "trace").to_value(),
            serde_json::json!("boom")
        );
        assert_eq!(
            Message::Structured(serde_json::json!([1, 2])).to_value(),
            serde_json::json!([1, 2])
        );
    }
}
