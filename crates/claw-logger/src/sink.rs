//! Buffered file sink.
//!
//! [`BufferedSink`] accumulates rendered records in memory and persists them
//! when the buffer reaches `max_messages_to_write` or when the last successful
//! flush is older than the flush interval. A background timer re-checks the
//! time condition so quiet channels still reach disk.
//!
//! At most one flush runs at a time: the `writing` flag is claimed before any
//! I/O, and a trigger that finds it set does nothing. The buffer is taken
//! synchronously when a flush starts, so records appended during the write
//! wait for the next flush.
//!
//! What is written, and how, is decided by a [`BatchFormat`]: plain text lines
//! appended to the file, or a structured document rewritten on every flush.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::{format_time, FileChannelConfig};
use crate::error::{LogError, Result};
use crate::grouping::{self, Grouped};
use crate::rotation::{self, FileNaming};
use crate::traits::{Channel, Pending};
use crate::types::LogEntry;

/// How a batch reaches its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Append the encoded batch to the file.
    Append,
    /// Read the existing document, merge the batch in and rewrite the file.
    Merge,
    /// Replace the file with the encoded batch.
    Replace,
}

/// Rendering and serialization strategy of a buffered sink.
pub trait BatchFormat: Send + Sync + 'static {
    /// A rendered entry held in the buffer.
    type Record: Grouped + Send + Sync + 'static;

    /// Default file extension for this format.
    fn default_extension(&self) -> &'static str;

    /// Renders an accepted entry; `date` is already formatted.
    fn render(&self, entry: &LogEntry, date: String) -> Self::Record;

    /// Write mode for ungrouped (`false`) or grouped (`true`) targets.
    fn write_mode(&self, _grouped: bool) -> WriteMode {
        WriteMode::Append
    }

    /// Encodes a batch on its own.
    fn encode(&self, records: &[Self::Record]) -> Result<Vec<u8>>;

    /// Merges a batch into the existing file contents, if any.
    ///
    /// Used by [`WriteMode::Merge`]. The default appends the encoded batch to
    /// the existing bytes; structured formats replace unreadable contents.
    fn merge(&self, existing: Option<&[u8]>, records: &[Self::Record]) -> Result<Vec<u8>> {
        let mut out = existing.map(<[u8]>::to_vec).unwrap_or_default();
        out.extend(self.encode(records)?);
        Ok(out)
    }
}

/// Why a flush attempt did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The storage directory has not been prepared yet.
    NotInitialized,
    /// Another flush is in progress.
    Busy,
    /// Nothing is buffered.
    Empty,
}

/// Result of one flush attempt.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// All records were written.
    Flushed(usize),
    /// Some or all records could not be written and were put back.
    Failed {
        /// Records returned to the buffer for retry.
        retained: usize,
        /// The failure.
        error: LogError,
    },
}

struct SinkState<R> {
    buffer: Vec<R>,
    last_flush: Instant,
}

struct SinkInner<F: BatchFormat> {
    name: String,
    config: FileChannelConfig,
    naming: FileNaming,
    format: F,
    state: Mutex<SinkState<F::Record>>,
    writing: AtomicBool,
    initialized: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// A buffered, optionally grouped, rotating file sink.
pub struct BufferedSink<F: BatchFormat> {
    inner: Arc<SinkInner<F>>,
}

impl<F: BatchFormat> Clone for BufferedSink<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: BatchFormat> BufferedSink<F> {
    /// Creates a sink. Nothing is written until [`init`](Self::init) completes.
    #[must_use]
    pub fn with_format(name: impl Into<String>, config: FileChannelConfig, format: F) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                name: name.into(),
                naming: FileNaming::from_config(&config),
                config,
                format,
                state: Mutex::new(SinkState {
                    buffer: Vec::new(),
                    last_flush: Instant::now(),
                }),
                writing: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Ensures the storage directory exists, then allows flushing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    /// Initializes the sink and starts the periodic flush timer on the
    /// current tokio runtime.
    ///
    /// Without a runtime this only logs a warning; entries keep buffering and
    /// are written by the next explicit [`flush`](Self::flush).
    pub fn start(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(channel = %self.inner.name, "no tokio runtime, periodic flush disabled");
            return;
        };

        let sink = Arc::downgrade(&self.inner);
        let period = self.inner.config.flush_interval;
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // every handle to the sink is gone
                let Some(inner) = sink.upgrade() else {
                    break;
                };
                if !inner.initialized.load(Ordering::Acquire) {
                    if let Err(e) = inner.init().await {
                        error!(channel = %inner.name, error = %e, "failed to prepare log storage");
                        continue;
                    }
                }

                if inner.flush_due() {
                    let _ = inner.try_flush().await;
                }
            }
        });

        if let Some(previous) = self.inner.timer.lock().replace(task) {
            previous.abort();
        }
    }

    /// Starts the sink and returns it, for construction chains.
    #[must_use]
    pub fn started(self) -> Self {
        self.start();
        self
    }

    /// Stops the periodic flush timer.
    pub fn stop(&self) {
        if let Some(task) = self.inner.timer.lock().take() {
            task.abort();
        }
    }

    /// Buffers an accepted entry and evaluates the flush trigger.
    ///
    /// A returned flush prepares storage first if [`init`](Self::init) has not
    /// run yet.
    pub fn accept(&self, entry: &LogEntry) -> Pending {
        if !self.inner.config.policy.should_log(entry) {
            return None;
        }

        let date = format_time(
            &entry.timestamp.with_timezone(&Local),
            &self.inner.config.date_format.pattern(),
        );
        let record = self.inner.format.render(entry, date);
        self.inner.state.lock().buffer.push(record);

        if !self.inner.flush_due() {
            return None;
        }

        let inner = Arc::clone(&self.inner);
        Some(Box::pin(async move {
            let _ = inner.prepare_and_flush().await;
        }))
    }

    /// Runs one guarded flush attempt.
    pub async fn try_flush(&self) -> FlushOutcome {
        self.inner.try_flush().await
    }

    /// Persists the whole buffer now, ignoring thresholds.
    ///
    /// Prepares storage first if needed and waits for an in-flight flush.
    ///
    /// # Errors
    ///
    /// Returns the write error; the failed records stay buffered.
    pub async fn flush(&self) -> Result<()> {
        loop {
            match self.inner.try_flush().await {
                FlushOutcome::Skipped(SkipReason::NotInitialized) => self.inner.init().await?,
                FlushOutcome::Skipped(SkipReason::Busy) => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                FlushOutcome::Skipped(SkipReason::Empty) | FlushOutcome::Flushed(_) => {
                    return Ok(());
                }
                FlushOutcome::Failed { error, .. } => return Err(error),
            }
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &FileChannelConfig {
        &self.inner.config
    }

    /// Returns the number of buffered records.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// Returns true while a flush is in progress.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.inner.writing.load(Ordering::Acquire)
    }

    /// Returns true once storage is prepared.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Returns the current ungrouped live file path.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.inner
            .naming
            .live_path(&self.inner.config.storage_path, &Local::now())
    }

    #[cfg(test)]
    pub(crate) fn set_writing(&self, writing: bool) {
        self.inner.writing.store(writing, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<F: BatchFormat> SinkInner<F> {
    async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.storage_path).await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Prepares storage on first use, then runs a guarded flush.
    async fn prepare_and_flush(&self) -> FlushOutcome {
        if !self.initialized.load(Ordering::Acquire) {
            if let Err(e) = self.init().await {
                error!(channel = %self.name, error = %e, "failed to prepare log storage");
                return FlushOutcome::Skipped(SkipReason::NotInitialized);
            }
        }
        self.try_flush().await
    }

    fn flush_due(&self) -> bool {
        let state = self.state.lock();
        !state.buffer.is_empty()
            && (state.buffer.len() >= self.config.max_messages_to_write
                || state.last_flush.elapsed() > self.config.flush_interval)
    }

    async fn try_flush(&self) -> FlushOutcome {
        if !self.initialized.load(Ordering::Acquire) {
            return FlushOutcome::Skipped(SkipReason::NotInitialized);
        }
        if self
            .writing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return FlushOutcome::Skipped(SkipReason::Busy);
        }

        let batch = std::mem::take(&mut self.state.lock().buffer);
        if batch.is_empty() {
            self.writing.store(false, Ordering::Release);
            return FlushOutcome::Skipped(SkipReason::Empty);
        }

        let count = batch.len();
        let outcome = if self.config.is_grouped() {
            self.write_grouped(batch).await
        } else {
            self.write_single(batch).await
        };

        let outcome = match outcome {
            Ok(()) => {
                self.state.lock().last_flush = Instant::now();
                debug!(channel = %self.name, count, "flushed log buffer");
                FlushOutcome::Flushed(count)
            }
            Err((failed, error)) => {
                let retained = failed.len();
                let mut state = self.state.lock();
                // failed records go back ahead of anything logged meanwhile
                let newer = std::mem::replace(&mut state.buffer, failed);
                state.buffer.extend(newer);
                FlushOutcome::Failed { retained, error }
            }
        };
        self.writing.store(false, Ordering::Release);
        outcome
    }

    async fn write_single(
        &self,
        batch: Vec<F::Record>,
    ) -> std::result::Result<(), (Vec<F::Record>, LogError)> {
        let now = Local::now();
        let path = self.naming.live_path(&self.config.storage_path, &now);

        if self.config.rotate {
            rotation::rotate_if_needed(&self.naming, &path, self.config.max_file_size, &now).await;
        }

        match self.write_batch(&path, &batch, self.format.write_mode(false)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(channel = %self.name, path = %path.display(), error = %e, "failed to write log");
                Err((batch, e))
            }
        }
    }

    async fn write_grouped(
        &self,
        batch: Vec<F::Record>,
    ) -> std::result::Result<(), (Vec<F::Record>, LogError)> {
        let now = Local::now();
        let groups = grouping::partition(batch, &self.config.group_by);
        let total = groups.len();
        let mut failed: Vec<(usize, F::Record)> = Vec::new();
        let mut failed_groups = 0;

        for group in groups {
            let dir = self.config.storage_path.join(&group.dir);
            let path = self.naming.live_path(&dir, &now);
            let (positions, records): (Vec<usize>, Vec<F::Record>) =
                group.records.into_iter().unzip();

            if let Err(e) = self.write_group(&dir, &path, &records, &now).await {
                error!(channel = %self.name, path = %path.display(), error = %e, "failed to write log group");
                failed_groups += 1;
                failed.extend(positions.into_iter().zip(records));
            }
        }

        if failed.is_empty() {
            return Ok(());
        }

        failed.sort_by_key(|(position, _)| *position);
        let records = failed.into_iter().map(|(_, record)| record).collect();
        Err((
            records,
            LogError::GroupWrite {
                failed: failed_groups,
                total,
            },
        ))
    }

    async fn write_group(
        &self,
        dir: &Path,
        path: &Path,
        records: &[F::Record],
        now: &chrono::DateTime<Local>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        if self.config.rotate {
            rotation::rotate_if_needed(&self.naming, path, self.config.max_file_size, now).await;
        }
        self.write_batch(path, records, self.format.write_mode(true)).await
    }

    async fn write_batch(&self, path: &Path, records: &[F::Record], mode: WriteMode) -> Result<()> {
        match mode {
            WriteMode::Append => {
                let bytes = self.format.encode(records)?;
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                file.write_all(&bytes).await?;
                file.flush().await?;
            }
            WriteMode::Merge => {
                let existing = match tokio::fs::read(path).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "error reading log file, reinitializing");
                        None
                    }
                };
                let bytes = self.format.merge(existing.as_deref(), records)?;
                tokio::fs::write(path, bytes).await?;
            }
            WriteMode::Replace => {
                let bytes = self.format.encode(records)?;
                tokio::fs::write(path, bytes).await?;
            }
        }
        Ok(())
    }
}

impl<F: BatchFormat> Drop for SinkInner<F> {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().take() {
            task.abort();
        }
    }
}

impl<F: BatchFormat> Channel for BufferedSink<F> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn log(&self, entry: &LogEntry) -> Pending {
        self.accept(entry)
    }

    fn flush(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(BufferedSink::flush(self))
    }

    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stop();
            BufferedSink::flush(self).await
        })
    }
}
