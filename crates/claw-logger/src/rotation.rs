//! File naming and size-based rotation.
//!
//! Live files are named `{base}.{extension}` where the base is either the
//! configured name or a date bucket. Rotation renames an oversized live file to
//! `{base}-{label}-{epochMillis}.{extension}` in the same directory so a fresh
//! file can start under the original name.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::config::{format_time, Chunk, FileChannelConfig};

/// Computes live and rotated file names for a channel.
#[derive(Debug, Clone)]
pub struct FileNaming {
    name: String,
    chunk: Chunk,
    extension: String,
    rotate_label: String,
}

impl FileNaming {
    /// Builds the naming rules from a resolved configuration.
    #[must_use]
    pub fn from_config(config: &FileChannelConfig) -> Self {
        Self {
            name: config.name.clone(),
            chunk: config.chunk,
            extension: config.extension.clone(),
            rotate_label: config.rotate_file_name.clone(),
        }
    }

    /// Returns the base file name (without extension) at `now`.
    #[must_use]
    pub fn base_name(&self, now: &DateTime<Local>) -> String {
        self.chunk.file_name(&self.name, now)
    }

    /// Returns the live file path inside `dir` at `now`.
    #[must_use]
    pub fn live_path(&self, dir: &Path, now: &DateTime<Local>) -> PathBuf {
        dir.join(format!("{}.{}", self.base_name(now), self.extension))
    }

    /// Returns the rotated file path inside `dir` for the given token.
    #[must_use]
    pub fn rotated_path(&self, dir: &Path, now: &DateTime<Local>, token: i64) -> PathBuf {
        dir.join(format!(
            "{}-{}-{}.{}",
            self.base_name(now),
            format_time(now, &self.rotate_label),
            token,
            self.extension
        ))
    }
}

/// What the pre-flush size check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The live file does not exist yet.
    Missing,
    /// The live file is below the size limit.
    BelowLimit,
    /// The live file was renamed to the contained path.
    Rotated(PathBuf),
    /// The check or the rename failed; the write proceeds on the live file.
    Failed,
}

/// Rotates the live file at `path` if its size meets or exceeds `max_size`.
///
/// Failures are reported through `tracing` and never abort the flush.
pub async fn rotate_if_needed(
    naming: &FileNaming,
    path: &Path,
    max_size: u64,
    now: &DateTime<Local>,
) -> RotationOutcome {
    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "log file does not exist, will be created on first write");
            return RotationOutcome::Missing;
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "error checking log file");
            return RotationOutcome::Failed;
        }
    };

    if size < max_size {
        return RotationOutcome::BelowLimit;
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut token = now.timestamp_millis();
    let mut target = naming.rotated_path(dir, now, token);
    // two rotations inside the same millisecond must not clobber each other
    while tokio::fs::try_exists(&target).await.unwrap_or(false) {
        token += 1;
        target = naming.rotated_path(dir, now, token);
    }

    match tokio::fs::rename(path, &target).await {
        Ok(()) => {
            info!(from = %path.display(), to = %target.display(), size, "rotated log file");
            RotationOutcome::Rotated(target)
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "error rotating log file");
            RotationOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileChannelOptions;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn naming(options: FileChannelOptions) -> FileNaming {
        let config = FileChannelConfig::resolve(options).expect("valid config");
        FileNaming::from_config(&config)
    }

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 17, 14, 2, 3)
            .earliest()
            .expect("valid local time")
    }

    #[test]
    fn live_path_single_chunk() {
        let naming = naming(FileChannelOptions::new().with_name("app"));
        let path = naming.live_path(Path::new("/var/log"), &fixed_now());
        assert_eq!(path, PathBuf::from("/var/log/app.log"));
    }

    #[test]
    fn live_path_daily_and_hourly() {
        let daily = naming(FileChannelOptions::new().with_chunk(Chunk::Daily));
        assert_eq!(
            daily.live_path(Path::new("logs"), &fixed_now()),
            PathBuf::from("logs/17-05-2024.log")
        );

        let hourly = naming(
            FileChannelOptions::new()
                .with_chunk(Chunk::Hourly)
                .with_extension("txt"),
        );
        assert_eq!(
            hourly.live_path(Path::new("logs"), &fixed_now()),
            PathBuf::from("logs/17-05-2024-14.txt")
        );
    }

    #[test]
    fn rotated_path_layout() {
        let naming = naming(FileChannelOptions::new().with_rotate_file_name("%Y%m%d"));
        let path = naming.rotated_path(Path::new("logs"), &fixed_now(), 1_700_000_000_123);
        assert_eq!(
            path,
            PathBuf::from("logs/app-20240517-1700000000123.log")
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = TempDir::new().expect("create temp dir");
        let naming = naming(FileChannelOptions::new());
        let path = dir.path().join("app.log");

        let outcome = rotate_if_needed(&naming, &path, 10, &fixed_now()).await;
        assert_eq!(outcome, RotationOutcome::Missing);
    }

    #[tokio::test]
    async fn small_file_is_kept() {
        let dir = TempDir::new().expect("create temp dir");
        let naming = naming(FileChannelOptions::new());
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"short\n").expect("write file");

        let outcome = rotate_if_needed(&naming, &path, 1024, &fixed_now()).await;
        assert_eq!(outcome, RotationOutcome::BelowLimit);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn oversized_file_is_renamed() {
        let dir = TempDir::new().expect("create temp dir");
        let naming = naming(FileChannelOptions::new());
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"0123456789").expect("write file");

        let outcome = rotate_if_needed(&naming, &path, 10, &fixed_now()).await;
        assert!(matches!(outcome, RotationOutcome::Rotated(_)));
        if let RotationOutcome::Rotated(target) = outcome {
            assert!(!path.exists());
            assert!(target.exists());
            let name = target.file_name().map(|n| n.to_string_lossy().into_owned());
            assert!(name.is_some_and(|n| n.starts_with("app-17-05-2024-") && n.ends_with(".log")));
        }
    }

    #[tokio::test]
    async fn same_millisecond_rotations_do_not_collide() {
        let dir = TempDir::new().expect("create temp dir");
        let naming = naming(FileChannelOptions::new());
        let path = dir.path().join("app.log");
        let now = fixed_now();

        std::fs::write(&path, b"first batch").expect("write file");
        let first = rotate_if_needed(&naming, &path, 1, &now).await;
        std::fs::write(&path, b"second batch").expect("write file");
        let second = rotate_if_needed(&naming, &path, 1, &now).await;

        assert!(matches!(first, RotationOutcome::Rotated(_)));
        assert!(matches!(second, RotationOutcome::Rotated(_)));
        assert_ne!(first, second);
        let rotated = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(rotated, 2);
    }
}
