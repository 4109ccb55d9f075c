//! Integration tests for the dispatcher driving real channels.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use claw_logger::{
    Channel, ConsoleChannel, FileChannel, FileChannelOptions, GroupKey, JsonFileChannel, LogEntry,
    LogLevel, Logger, Message,
};
use parking_lot::Mutex;
use tempfile::TempDir;

// ==================== Helper Functions ====================

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn options(dir: &Path) -> FileChannelOptions {
    FileChannelOptions::new()
        .with_storage_path(dir)
        .with_date_format("%Y-%m-%d", "%H:%M:%S")
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn read_messages(path: &Path) -> Vec<serde_json::Value> {
    let raw = std::fs::read(path).unwrap_or_default();
    serde_json::from_slice::<serde_json::Value>(&raw)
        .ok()
        .and_then(|doc| doc.get("messages").and_then(|m| m.as_array()).cloned())
        .unwrap_or_default()
}

// ==================== End-to-End Dispatch Tests ====================

#[tokio::test]
async fn test_broadcast_reaches_every_channel() {
    let dir = TempDir::new().expect("create temp dir");
    let console_out = SharedBuffer::default();

    let file = FileChannel::new(options(dir.path()).with_max_messages_to_write(1))
        .expect("file channel");
    let json = JsonFileChannel::new(options(dir.path()).with_max_messages_to_write(1))
        .expect("json channel");
    file.init().await.expect("init file");
    json.init().await.expect("init json");

    let logger = Logger::new();
    logger
        .add_channel(ConsoleChannel::new().with_writer(console_out.clone()))
        .add_channel(file.clone())
        .add_channel(json.clone());

    logger
        .success("deploy", "finish", "\u{1b}[32mrollout complete\u{1b}[0m")
        .settled()
        .await;

    assert!(console_out.contents().contains("rollout complete"));
    assert!(console_out.contents().contains('\u{1b}'));

    let lines = read_lines(&file.file_path());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("[success] [deploy][finish]: rollout complete"));

    let messages = read_messages(&json.file_path());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "rollout complete");
    assert_eq!(messages[0]["level"], "success");
}

#[tokio::test]
async fn test_per_channel_level_policies() {
    let dir = TempDir::new().expect("create temp dir");
    let errors = FileChannel::with_name(
        "errors",
        options(dir.path())
            .with_name("errors")
            .with_levels([LogLevel::Error])
            .with_max_messages_to_write(1),
    )
    .expect("errors channel");
    let everything = FileChannel::new(options(dir.path()).with_max_messages_to_write(1))
        .expect("file channel");
    errors.init().await.expect("init");
    everything.init().await.expect("init");

    let logger = Logger::new();
    logger.add_channel(errors.clone()).add_channel(everything.clone());

    logger.info("api", "request", "GET /").settled().await;
    logger.error("api", "request", "boom").settled().await;

    assert_eq!(read_lines(&errors.file_path()).len(), 1);
    assert_eq!(read_lines(&everything.file_path()).len(), 2);
    assert!(logger.channel("errors").is_some());
}

#[tokio::test]
async fn test_shutdown_flushes_buffered_entries() {
    let dir = TempDir::new().expect("create temp dir");
    let file = FileChannel::new(options(dir.path())).expect("file channel");
    let json = JsonFileChannel::new(options(dir.path())).expect("json channel");

    let logger = Logger::new();
    logger.add_channel(file.clone()).add_channel(json.clone());

    for n in 0..5 {
        logger.info("worker", "tick", format!("tick {n}")).settled().await;
    }
    assert_eq!(file.buffered(), 5);
    assert_eq!(json.buffered(), 5);

    logger.shutdown().await.expect("shutdown");

    assert_eq!(file.buffered(), 0);
    assert_eq!(json.buffered(), 0);
    assert_eq!(read_lines(&file.file_path()).len(), 5);
    assert_eq!(read_messages(&json.file_path()).len(), 5);
}

#[tokio::test]
async fn test_grouped_json_by_level_and_module() {
    let dir = TempDir::new().expect("create temp dir");
    let json = JsonFileChannel::new(
        options(dir.path())
            .with_group_by([GroupKey::Level, GroupKey::Module])
            .with_max_messages_to_write(3),
    )
    .expect("json channel");
    json.init().await.expect("init");

    let logger = Logger::with_channels(vec![Arc::new(json)]);
    logger.warn("auth", "login", "bad password").settled().await;
    logger.info("auth", "login", "ok").settled().await;
    logger.warn("auth", "login", "locked").settled().await;

    let warn_file = dir.path().join("warn").join("auth").join("app.json");
    let info_file = dir.path().join("info").join("auth").join("app.json");

    let warns = read_messages(&warn_file);
    assert_eq!(warns.len(), 2);
    assert_eq!(warns[0]["content"], "bad password");
    assert_eq!(warns[1]["content"], "locked");
    assert_eq!(read_messages(&info_file).len(), 1);
}

#[tokio::test]
async fn test_error_messages_carry_their_trace() {
    let dir = TempDir::new().expect("create temp dir");
    let file = FileChannel::new(options(dir.path()).with_max_messages_to_write(1))
        .expect("file channel");
    let json = JsonFileChannel::new(options(dir.path()).with_max_messages_to_write(1))
        .expect("json channel");
    file.init().await.expect("init");
    json.init().await.expect("init");

    let logger = Logger::new();
    logger.add_channel(file.clone()).add_channel(json.clone());

    let cause = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
    logger
        .error("db", "connect", Message::from(&cause))
        .settled()
        .await;

    let text = std::fs::read_to_string(file.file_path()).unwrap_or_default();
    assert!(text.contains("[error] [db][connect]: connection refused\n[trace]\n"));

    let messages = read_messages(&json.file_path());
    assert_eq!(messages[0]["content"], "connection refused");
    assert!(messages[0]["stack"].as_array().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn test_structured_entries_keep_context() {
    let dir = TempDir::new().expect("create temp dir");
    let json = JsonFileChannel::new(options(dir.path()).with_max_messages_to_write(1))
        .expect("json channel");
    json.init().await.expect("init");

    let logger = Logger::with_channels(vec![Arc::new(json.clone())]);
    let entry = LogEntry::builder()
        .level(LogLevel::Debug)
        .module("scheduler")
        .action("place")
        .message(serde_json::json!({"node": "n-1", "gpus": 2}))
        .context("request_id", serde_json::json!("r-42"))
        .build()
        .expect("build entry");
    logger.log_entry(&entry).settled().await;

    let messages = read_messages(&json.file_path());
    assert_eq!(messages[0]["content"]["gpus"], 2);
    assert_eq!(messages[0]["context"]["request_id"], "r-42");
    assert_eq!(json.name(), "fileJson");
}
