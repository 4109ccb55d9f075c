//! Terminal output channel.
//!
//! Renders one color-coded line per accepted entry, synchronously, with no
//! buffering. Structured messages are echoed in full on a second line.

use std::io::{self, Write};

use chrono::SecondsFormat;
use crossterm::style::Stylize;
use parking_lot::Mutex;

use crate::config::ChannelPolicy;
use crate::traits::{Channel, Pending};
use crate::types::{LogEntry, LogLevel};

/// Channel writing colored lines to a terminal.
pub struct ConsoleChannel {
    name: String,
    policy: ChannelPolicy,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleChannel {
    /// Creates a console channel writing to stdout and accepting every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(ChannelPolicy::default())
    }

    /// Creates a console channel with the given accept policy.
    #[must_use]
    pub fn with_policy(policy: ChannelPolicy) -> Self {
        Self {
            name: "console".to_string(),
            policy,
            out: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Replaces the output stream.
    #[must_use]
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.out = Mutex::new(Box::new(writer));
        self
    }

    /// Renames the channel.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Renders the lines printed for an entry.
    #[must_use]
    pub fn render(&self, entry: &LogEntry) -> Vec<String> {
        let date = format!(
            "({})",
            entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let module = format!("[{}]", entry.module).dark_cyan();
        let action = format!("[{}]", entry.action).dark_magenta();
        let text = entry.message.text();

        let line = match entry.level {
            LogLevel::Debug => format!(
                "{} {} {module} {action} {}",
                "⚙".magenta(),
                date.dark_yellow(),
                text.magenta()
            ),
            LogLevel::Info => format!(
                "{} {} {module} {action} {}",
                "ℹ".blue(),
                date.dark_yellow(),
                text.blue()
            ),
            LogLevel::Warn => format!(
                "{} {} {module} {action} {}",
                "⚠".dark_yellow(),
                date.dark_green(),
                text.yellow()
            ),
            LogLevel::Error => format!(
                "{} {} {module} {action} {}",
                "✗".dark_red(),
                date.dark_yellow(),
                text.red()
            ),
            LogLevel::Success => format!(
                "{} {} {module} {action} {}",
                "✓".dark_green(),
                date.dark_yellow(),
                text.green()
            ),
        };

        let mut lines = vec![line];
        if let crate::types::Message::Structured(value) = &entry.message {
            lines.push(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
        }
        lines
    }
}

impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        Some("colored terminal output")
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn log(&self, entry: &LogEntry) -> Pending {
        if !self.policy.should_log(entry) {
            return None;
        }

        let lines = self.render(entry);
        let mut out = self.out.lock();
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
        None
    }
}
