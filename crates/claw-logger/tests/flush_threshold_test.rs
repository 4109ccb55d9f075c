//! Property tests for the flush threshold.

use claw_logger::{FileChannel, FileChannelOptions, LogEntry, LogLevel};
use proptest::prelude::*;
use tempfile::TempDir;

fn buffered_after(count: usize, threshold: usize) -> (usize, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");

    runtime.block_on(async {
        let dir = TempDir::new().expect("create temp dir");
        let channel = FileChannel::new(
            FileChannelOptions::new()
                .with_storage_path(dir.path())
                .with_max_messages_to_write(threshold),
        )
        .expect("file channel");

        for n in 0..count {
            let entry = LogEntry::new(LogLevel::Info, "app", "tick", format!("m{n}"));
            if let Some(pending) = channel.accept(&entry) {
                pending.await;
            }
        }

        let written = std::fs::read_to_string(channel.file_path())
            .map(|s| s.lines().count())
            .unwrap_or(0);
        (channel.buffered(), written)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn remainder_stays_buffered(count in 0usize..40, threshold in 1usize..8) {
        let (buffered, written) = buffered_after(count, threshold);
        prop_assert_eq!(buffered, count % threshold);
        prop_assert_eq!(written, count - count % threshold);
    }
}
