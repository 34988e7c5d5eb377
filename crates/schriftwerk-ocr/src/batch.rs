// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded-concurrency batch OCR.
//
// One tokio task per input, gated by a semaphore sized from
// `BatchConfig::max_concurrency`. Each task owns its input and hands its
// result back through its `JoinHandle`; handles are awaited in input order so
// every result (and every panic) lands at the index it came from. A failing
// unit never stops the others.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schriftwerk_core::config::BatchConfig;
use schriftwerk_core::error::{Result, SchriftwerkError};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::client::OcrBackend;

/// One image to send to the OCR backend.
#[derive(Debug, Clone)]
pub struct OcrInput {
    /// Name reported to the service as the upload's file name.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl OcrInput {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Cancel every unit observing this token. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Success/failure tally for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed ({} total)",
            self.succeeded, self.failed, self.total
        )
    }
}

/// Per-input results, index-aligned with the batch input.
#[derive(Debug)]
pub struct BatchOutcome {
    results: Vec<Result<Vec<u8>>>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[Result<Vec<u8>>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Result<Vec<u8>>> {
        self.results
    }

    /// Split into two N-length vectors: `results[i]` is set exactly when
    /// `errors[i]` is not.
    pub fn into_parts(self) -> (Vec<Option<Vec<u8>>>, Vec<Option<SchriftwerkError>>) {
        self.results
            .into_iter()
            .map(|result| match result {
                Ok(payload) => (Some(payload), None),
                Err(err) => (None, Some(err)),
            })
            .unzip()
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.results.iter().filter(|r| r.is_ok()).count();
        BatchSummary {
            succeeded,
            failed: self.results.len() - succeeded,
            total: self.results.len(),
        }
    }
}

/// Where a unit's image bytes come from.
enum UnitSource {
    Memory(OcrInput),
    File(PathBuf),
}

/// Runs OCR over many images with bounded concurrency.
pub struct OcrBatchRunner {
    backend: Arc<dyn OcrBackend>,
    config: BatchConfig,
}

impl OcrBatchRunner {
    /// Create a runner. `max_concurrency` must be at least 1.
    pub fn new(backend: Arc<dyn OcrBackend>, config: BatchConfig) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(SchriftwerkError::Config(
                "batch.max_concurrency must be at least 1".into(),
            ));
        }
        Ok(Self { backend, config })
    }

    /// Concurrency settings this runner was built with.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// OCR every input. Returns after all of them have finished.
    pub async fn run(&self, inputs: Vec<OcrInput>) -> BatchOutcome {
        self.run_with_cancel(inputs, CancelToken::new()).await
    }

    /// As [`run`](Self::run), but units still queued or in flight when
    /// `cancel` fires finish with [`SchriftwerkError::Cancelled`].
    #[instrument(
        skip_all,
        fields(batch_size = inputs.len(), max_concurrency = self.config.max_concurrency)
    )]
    pub async fn run_with_cancel(
        &self,
        inputs: Vec<OcrInput>,
        cancel: CancelToken,
    ) -> BatchOutcome {
        let sources = inputs.into_iter().map(UnitSource::Memory).collect();
        self.dispatch(sources, cancel).await
    }

    /// Read each file and OCR it. A file that cannot be read fails only its
    /// own index.
    #[instrument(skip_all, fields(batch_size = paths.len()))]
    pub async fn run_paths(&self, paths: Vec<impl AsRef<Path>>) -> BatchOutcome {
        let sources = paths
            .into_iter()
            .map(|path| UnitSource::File(path.as_ref().to_path_buf()))
            .collect();
        self.dispatch(sources, CancelToken::new()).await
    }

    async fn dispatch(&self, sources: Vec<UnitSource>, cancel: CancelToken) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let handles: Vec<JoinHandle<Result<Vec<u8>>>> = sources
            .into_iter()
            .map(|source| {
                let backend = Arc::clone(&self.backend);
                let semaphore = Arc::clone(&semaphore);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(SchriftwerkError::Cancelled),
                        result = process_unit(backend, semaphore, source) => result,
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(index, error = %join_err, "OCR worker did not complete");
                    Err(SchriftwerkError::TaskFailed(format!(
                        "unit {}: {}",
                        index, join_err
                    )))
                }
            };
            if let Err(err) = &result {
                debug!(index, error = %err, "OCR unit failed");
            }
            results.push(result);
        }

        let outcome = BatchOutcome { results };
        let summary = outcome.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            total = summary.total,
            "OCR batch complete"
        );
        outcome
    }
}

async fn process_unit(
    backend: Arc<dyn OcrBackend>,
    semaphore: Arc<Semaphore>,
    source: UnitSource,
) -> Result<Vec<u8>> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|err| SchriftwerkError::TaskFailed(format!("semaphore closed: {}", err)))?;

    let input = match source {
        UnitSource::Memory(input) => input,
        UnitSource::File(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| SchriftwerkError::InputRead {
                    path: path.display().to_string(),
                    source,
                })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            OcrInput { filename, bytes }
        }
    };

    debug!(filename = %input.filename, bytes = input.bytes.len(), "Sending image to OCR backend");
    backend.extract_text(input.bytes, &input.filename).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the filename back, fails on "fail*", panics on "panic*", and
    /// records the peak number of concurrent calls.
    #[derive(Default)]
    struct StubBackend {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl StubBackend {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl OcrBackend for StubBackend {
        async fn extract_text(&self, image: Vec<u8>, filename: &str) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if filename.starts_with("panic") {
                panic!("backend blew up on {filename}");
            }
            if filename.starts_with("fail") {
                return Err(SchriftwerkError::Transport(format!("{filename} rejected")));
            }
            let mut out = filename.as_bytes().to_vec();
            out.extend_from_slice(&image);
            Ok(out)
        }
    }

    fn runner(backend: Arc<StubBackend>, max_concurrency: usize) -> OcrBatchRunner {
        OcrBatchRunner::new(backend, BatchConfig { max_concurrency }).unwrap()
    }

    fn inputs(names: &[&str]) -> Vec<OcrInput> {
        names.iter().map(|n| OcrInput::new(*n, vec![b'!'])).collect()
    }

    #[test]
    fn zero_concurrency_rejected() {
        let backend = Arc::new(StubBackend::default());
        assert!(OcrBatchRunner::new(backend, BatchConfig { max_concurrency: 0 }).is_err());
    }

    #[tokio::test]
    async fn failures_are_independent() {
        let outcome = runner(Arc::new(StubBackend::default()), 4)
            .run(inputs(&["a", "fail", "c"]))
            .await;
        assert_eq!(
            outcome.summary(),
            BatchSummary {
                succeeded: 2,
                failed: 1,
                total: 3
            }
        );

        let (results, errors) = outcome.into_parts();
        assert_eq!(results.len(), 3);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].is_none());
        assert!(matches!(errors[1], Some(SchriftwerkError::Transport(_))));
        assert!(errors[2].is_none());
        assert!(results[0].as_ref().is_some_and(|r| !r.is_empty()));
        assert!(results[1].is_none());
        assert!(results[2].as_ref().is_some_and(|r| !r.is_empty()));
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        let names = ["p1", "p2", "p3", "p4", "p5", "p6"];
        let outcome = runner(Arc::new(StubBackend::default()), 2)
            .run(inputs(&names))
            .await;
        let (results, _) = outcome.into_parts();
        for (name, result) in names.iter().zip(results) {
            assert_eq!(result.unwrap(), format!("{name}!").into_bytes());
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(20)));
        let names: Vec<String> = (0..10).map(|i| format!("img{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let outcome = runner(Arc::clone(&backend), 3).run(inputs(&names)).await;
        assert_eq!(outcome.summary().succeeded, 10);

        let peak = backend.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded the limit");
        assert!(peak >= 2, "batch never ran concurrently");
    }

    #[tokio::test]
    async fn empty_batch_is_empty_outcome() {
        let outcome = runner(Arc::new(StubBackend::default()), 1).run(Vec::new()).await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.summary().total, 0);
    }

    #[tokio::test]
    async fn panicking_unit_is_recorded_at_its_index() {
        let outcome = runner(Arc::new(StubBackend::default()), 2)
            .run(inputs(&["ok", "panic", "ok2"]))
            .await;
        let results = outcome.into_results();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SchriftwerkError::TaskFailed(_))));
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn pre_cancelled_batch_cancels_every_unit() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(cancel.is_cancelled());

        let outcome = runner(Arc::new(StubBackend::default()), 2)
            .run_with_cancel(inputs(&["a", "b", "c"]), cancel)
            .await;
        assert_eq!(outcome.summary().failed, 3);
        assert!(
            outcome
                .results()
                .iter()
                .all(|r| matches!(r, Err(SchriftwerkError::Cancelled)))
        );
    }

    #[tokio::test]
    async fn cancel_interrupts_in_flight_requests() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_secs(30)));
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            runner(backend, 1).run_with_cancel(inputs(&["a", "b"]), cancel),
        )
        .await
        .expect("cancellation did not stop the batch");

        assert!(
            outcome
                .results()
                .iter()
                .all(|r| matches!(r, Err(SchriftwerkError::Cancelled)))
        );
    }

    #[tokio::test]
    async fn run_paths_reads_files_and_reports_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("scan1.jpg");
        let third = dir.path().join("scan3.jpg");
        std::fs::write(&first, b"A").unwrap();
        std::fs::write(&third, b"C").unwrap();
        let missing = dir.path().join("scan2.jpg");

        let outcome = runner(Arc::new(StubBackend::default()), 2)
            .run_paths(vec![first, missing, third])
            .await;
        let results = outcome.into_results();
        assert_eq!(results[0].as_ref().unwrap(), b"scan1.jpgA");
        assert!(matches!(results[1], Err(SchriftwerkError::InputRead { .. })));
        assert_eq!(results[2].as_ref().unwrap(), b"scan3.jpgC");
    }

    #[test]
    fn summary_display() {
        let summary = BatchSummary {
            succeeded: 2,
            failed: 1,
            total: 3,
        };
        assert_eq!(summary.to_string(), "2 succeeded, 1 failed (3 total)");
    }
}
