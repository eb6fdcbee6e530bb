//! Batch classification engine.
//!
//! Records are partitioned into consecutive batches of at most
//! `max_batch_size`. Each batch is one classifier request, retried with
//! exponential backoff while the error is transient. Up to `concurrency`
//! batches are in flight at once; each finished batch is merged straight
//! into a slot vector indexed by record position, so completion order never
//! affects the result.
//!
//! Batch lifecycle:
//!
//! ```text
//! Formed -> Sent -> ResponseReceived -> Merged
//!                -> Failed -> MergedWithSentinel
//! Formed | Sent -> Abandoned   (run cancelled)
//! ```

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{BatchItem, Classifier, EmotionVocabulary, PositionLabel};
use crate::error::ClassifierError;

/// Batching, retry and concurrency limits.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use chatmood::classify::BatchConfig;
///
/// let config = BatchConfig::new()
///     .with_max_batch_size(50)
///     .with_max_attempts(5)
///     .with_request_timeout(Duration::from_secs(30));
/// assert_eq!(config.max_batch_size, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum records per request (default: 30)
    pub max_batch_size: usize,

    /// Attempts per batch, including the first (default: 3)
    pub max_attempts: u32,

    /// Delay before the first retry (default: 750ms)
    pub initial_backoff: Duration,

    /// Upper bound for the retry delay (default: 5s)
    pub max_backoff: Duration,

    /// Timeout for a single attempt (default: 60s)
    pub request_timeout: Duration,

    /// Batches in flight at once (default: 4)
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 30,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(750),
            max_backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            concurrency: 4,
        }
    }
}

impl BatchConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum batch size (clamped to at least 1).
    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    /// Sets the number of attempts per batch (clamped to at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial and maximum retry delays.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the number of concurrent requests (clamped to at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Formed,
    Sent,
    ResponseReceived,
    Failed,
    Merged,
    MergedWithSentinel,
    Abandoned,
}

impl BatchState {
    /// Returns `true` for states a batch never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchState::Merged | BatchState::MergedWithSentinel | BatchState::Abandoned
        )
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Formed => "formed",
            BatchState::Sent => "sent",
            BatchState::ResponseReceived => "response received",
            BatchState::Failed => "failed",
            BatchState::Merged => "merged",
            BatchState::MergedWithSentinel => "merged with sentinel",
            BatchState::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// 0-based batch number.
    pub index: usize,
    /// Record indices covered by the batch.
    pub range: Range<usize>,
    /// Final state.
    pub state: BatchState,
    /// Requests sent.
    pub attempts: u32,
    /// Records that received a vocabulary label.
    pub valid: usize,
    /// Records that received the sentinel.
    pub substituted: usize,
    /// Last error, for failed batches.
    pub error: Option<String>,
}

impl BatchReport {
    fn new(index: usize, range: Range<usize>) -> Self {
        Self {
            index,
            range,
            state: BatchState::Formed,
            attempts: 0,
            valid: 0,
            substituted: 0,
            error: None,
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns `true` for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Labels for every record, in record order, plus one report per batch.
#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    pub labels: Vec<String>,
    pub reports: Vec<BatchReport>,
}

impl ClassificationOutcome {
    /// Batches whose attempts were exhausted.
    pub fn failed_batches(&self) -> usize {
        self.count_state(BatchState::MergedWithSentinel)
    }

    /// Batches dropped by cancellation.
    pub fn abandoned_batches(&self) -> usize {
        self.count_state(BatchState::Abandoned)
    }

    /// Records labelled from the vocabulary.
    pub fn classified_records(&self) -> usize {
        self.reports.iter().map(|r| r.valid).sum()
    }

    /// Records labelled with the sentinel.
    pub fn sentinel_records(&self) -> usize {
        self.reports.iter().map(|r| r.substituted).sum()
    }

    fn count_state(&self, state: BatchState) -> usize {
        self.reports.iter().filter(|r| r.state == state).count()
    }
}

/// Splits `0..len` into consecutive ranges of at most `max` records.
///
/// ```
/// use chatmood::classify::partition;
///
/// assert_eq!(partition(65, 30), vec![0..30, 30..60, 60..65]);
/// assert!(partition(0, 30).is_empty());
/// ```
pub fn partition(len: usize, max: usize) -> Vec<Range<usize>> {
    let max = max.max(1);
    (0..len)
        .step_by(max)
        .map(|start| start..(start + max).min(len))
        .collect()
}

/// Result of running one batch, before it is merged.
struct BatchResult {
    report: BatchReport,
    labels: Option<Vec<String>>,
}

/// Drives a [`Classifier`] over a whole record sequence.
pub struct BatchEngine {
    classifier: Arc<dyn Classifier>,
    vocabulary: Arc<EmotionVocabulary>,
    config: BatchConfig,
}

impl BatchEngine {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        vocabulary: Arc<EmotionVocabulary>,
        config: BatchConfig,
    ) -> Self {
        Self {
            classifier,
            vocabulary,
            config,
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Classifies `texts`, returning exactly one label per text in the same
    /// order.
    ///
    /// Never fails: failed or abandoned batches get the sentinel.
    pub async fn classify_all(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> ClassificationOutcome {
        let ranges = partition(texts.len(), self.config.max_batch_size);
        tracing::info!(
            records = texts.len(),
            batches = ranges.len(),
            max_batch_size = self.config.max_batch_size,
            "Classifying records"
        );

        let mut slots: Vec<Option<String>> = vec![None; texts.len()];
        let mut reports: Vec<Option<BatchReport>> = vec![None; ranges.len()];

        let mut results = stream::iter(ranges.into_iter().enumerate())
            .map(|(index, range)| {
                let items: Vec<BatchItem> = texts[range.clone()]
                    .iter()
                    .zip(1..)
                    .map(|(text, position)| BatchItem {
                        position,
                        text: text.clone(),
                    })
                    .collect();
                self.run_batch(index, range, items, cancel)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some(BatchResult { mut report, labels }) = results.next().await {
            let unknown = self.vocabulary.unknown();
            let start = report.range.start;
            match labels {
                Some(labels) => {
                    for (offset, label) in labels.into_iter().enumerate() {
                        slots[start + offset] = Some(label);
                    }
                    report.state = BatchState::Merged;
                }
                None => {
                    for slot in &mut slots[report.range.clone()] {
                        *slot = Some(unknown.to_string());
                    }
                    report.substituted = report.len();
                    if report.state == BatchState::Failed {
                        report.state = BatchState::MergedWithSentinel;
                    }
                }
            }
            tracing::debug!(batch = report.index, state = %report.state, "Batch merged");
            let index = report.index;
            reports[index] = Some(report);
        }

        let unknown = self.vocabulary.unknown();
        ClassificationOutcome {
            labels: slots
                .into_iter()
                .map(|slot| slot.unwrap_or_else(|| unknown.to_string()))
                .collect(),
            reports: reports.into_iter().flatten().collect(),
        }
    }

    /// Sends one batch until it succeeds, fails for good or is cancelled.
    async fn run_batch(
        &self,
        index: usize,
        range: Range<usize>,
        items: Vec<BatchItem>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let span = tracing::info_span!("batch", batch = index, size = items.len());
        async move {
            let mut report = BatchReport::new(index, range);
            let mut backoff = self.config.initial_backoff;

            loop {
                if cancel.is_cancelled() {
                    return Self::abandon(report);
                }

                report.attempts += 1;
                report.state = BatchState::Sent;
                tracing::debug!(attempt = report.attempts, "Sending batch");

                let attempt = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Self::abandon(report),
                    result = tokio::time::timeout(
                        self.config.request_timeout,
                        self.classifier.classify(&items),
                    ) => result,
                };
                let error = match attempt {
                    Ok(Ok(pairs)) => {
                        report.state = BatchState::ResponseReceived;
                        let labels = self.align(pairs, &mut report);
                        return BatchResult {
                            report,
                            labels: Some(labels),
                        };
                    }
                    Ok(Err(error)) => error,
                    Err(_) => ClassifierError::Timeout(self.config.request_timeout),
                };

                if !error.is_retryable() || report.attempts >= self.config.max_attempts {
                    tracing::warn!(
                        attempts = report.attempts,
                        error = %error,
                        "Batch failed, labelling it with the sentinel"
                    );
                    report.state = BatchState::Failed;
                    report.error = Some(error.to_string());
                    return BatchResult {
                        report,
                        labels: None,
                    };
                }

                tracing::warn!(
                    attempt = report.attempts,
                    error = %error,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Batch attempt failed, retrying"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Self::abandon(report),
                    () = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(self.config.max_backoff);
            }
        }
        .instrument(span)
        .await
    }

    fn abandon(mut report: BatchReport) -> BatchResult {
        tracing::info!(batch = report.index, "Batch abandoned");
        report.state = BatchState::Abandoned;
        report.error = Some(ClassifierError::Cancelled.to_string());
        BatchResult {
            report,
            labels: None,
        }
    }

    /// Maps returned labels onto batch positions. Missing positions and
    /// labels outside the vocabulary become the sentinel.
    fn align(&self, pairs: Vec<PositionLabel>, report: &mut BatchReport) -> Vec<String> {
        let len = report.len();
        let mut slots: Vec<Option<Option<&str>>> = vec![None; len];
        for pair in &pairs {
            let Some(slot) = pair.position.checked_sub(1).and_then(|i| slots.get_mut(i)) else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(self.vocabulary.resolve(&pair.label));
            }
        }

        let mut labels = Vec::with_capacity(len);
        for (offset, slot) in slots.into_iter().enumerate() {
            match slot.flatten() {
                Some(label) => {
                    report.valid += 1;
                    labels.push(label.to_string());
                }
                None => {
                    report.substituted += 1;
                    tracing::debug!(position = offset + 1, "No valid label for position");
                    labels.push(self.vocabulary.unknown().to_string());
                }
            }
        }
        labels
    }
}
