//! The update-retrieval loop.
//!
//! [`PollingLoop`] owns the cursor into the feed. Each iteration long-polls the
//! feed at the cursor, dispatches the returned batch to the [`UpdateProcessor`]
//! in order, and only then moves the cursor past the last attempted update.
//! Fetch failures keep the cursor and retry after a [`RetryBackoff`] delay;
//! per-update failures are logged and skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::PollingConfig;
use crate::feed::{FeedClient, FeedError, Update};
use crate::processor::UpdateProcessor;

/// Exponential delay between retries of a failing fetch
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl RetryBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following one doubles, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Result of dispatching one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub failed: usize,
    /// Updates left undispatched because shutdown was requested
    pub skipped: usize,
}

pub struct PollingLoop {
    feed: Arc<dyn FeedClient>,
    processor: UpdateProcessor,
    cursor: i64,
    limit: u8,
    timeout: Duration,
    backoff: RetryBackoff,
    /// Consecutive batches rejected at the current cursor
    rejected_batches: u32,
    shutdown: watch::Receiver<bool>,
}

impl PollingLoop {
    pub fn new(
        feed: Arc<dyn FeedClient>,
        processor: UpdateProcessor,
        config: &PollingConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            feed,
            processor,
            cursor: config.initial_offset,
            limit: config.limit,
            timeout: config.timeout(),
            backoff: RetryBackoff::new(config.retry_delay(), config.max_retry_delay()),
            rejected_batches: 0,
            shutdown,
        }
    }

    /// Next update id to request
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Poll until shutdown is signalled. Fetch errors are retried forever.
    pub async fn run(&mut self) {
        info!("Polling for updates from offset {}", self.cursor);

        while !self.shutdown_requested() {
            let feed = Arc::clone(&self.feed);
            let fetched = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => break,
                res = feed.fetch(self.cursor, self.limit, self.timeout) => res,
            };

            let result = match fetched {
                Ok(batch) => self.handle_batch(batch).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => self.backoff.reset(),
                Err(e) => {
                    let delay = retry_delay(&mut self.backoff, &e);
                    warn!(
                        "Polling at offset {} failed: {}; retrying in {:?}",
                        self.cursor, e, delay
                    );
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut self.shutdown) => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Polling stopped at offset {}", self.cursor);
    }

    /// One fetch-and-dispatch iteration, without cancellation or retry delay.
    #[cfg(test)]
    pub async fn poll_once(&mut self) -> Result<BatchReport, FeedError> {
        let batch = self
            .feed
            .fetch(self.cursor, self.limit, self.timeout)
            .await?;
        self.handle_batch(batch).await
    }

    async fn handle_batch(&mut self, batch: Vec<Update>) -> Result<BatchReport, FeedError> {
        if batch.is_empty() {
            debug!("No updates at offset {}", self.cursor);
            return Ok(BatchReport::default());
        }

        if let Err(e) = validate_batch(self.cursor, &batch) {
            self.rejected_batches += 1;
            error!(
                "Rejecting batch at offset {} ({} consecutive rejection(s)): {}",
                self.cursor, self.rejected_batches, e
            );
            return Err(e);
        }
        self.rejected_batches = 0;

        Ok(self.dispatch(&batch).await)
    }

    async fn dispatch(&mut self, batch: &[Update]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut last_attempted = None;

        for update in batch {
            if self.shutdown_requested() {
                report.skipped = batch.len() - report.attempted;
                info!(
                    "Shutdown requested; leaving {} update(s) of the batch undispatched",
                    report.skipped
                );
                break;
            }

            if let Err(e) = self.processor.process(update).await {
                error!("Skipping update {}: {:#}", update.id, anyhow::Error::new(e));
                report.failed += 1;
            }
            report.attempted += 1;
            last_attempted = Some(update.id);
        }

        if let Some(id) = last_attempted {
            self.cursor = id + 1;
        }
        debug!(
            "Dispatched {} update(s), {} failed; offset now {}",
            report.attempted, report.failed, self.cursor
        );
        report
    }
}

/// Backoff delay, stretched to any wait the feed asked for.
fn retry_delay(backoff: &mut RetryBackoff, err: &FeedError) -> Duration {
    let delay = backoff.next_delay();
    err.retry_after().map_or(delay, |hint| delay.max(hint))
}

/// A batch must be strictly ascending and start at or after the cursor,
/// otherwise advancing past its last id could skip or revisit updates.
fn validate_batch(cursor: i64, batch: &[Update]) -> Result<(), FeedError> {
    let mut previous: Option<i64> = None;

    for update in batch {
        if let Some(prev) = previous {
            if update.id <= prev {
                return Err(FeedError::Malformed(format!(
                    "update id {} follows {} (ids must be strictly increasing)",
                    update.id, prev
                )));
            }
        } else if update.id < cursor {
            return Err(FeedError::Malformed(format!(
                "update id {} is below offset {}",
                update.id, cursor
            )));
        }
        previous = Some(update.id);
    }
    Ok(())
}

/// Resolves once shutdown is signalled; never resolves if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
