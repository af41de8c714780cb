use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use crate::{LogEntry, MetricSample, TelemetrySink};

#[derive(Clone, Debug)]
pub struct ExporterConfig {
    pub flush_interval: Duration,
    pub max_batch_size: usize,
    pub queue_capacity: usize,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(2),
            max_batch_size: 50,
            queue_capacity: 1000,
        }
    }
}

/// Formatted telemetry for one call.
#[derive(Clone, Debug)]
pub struct TelemetryEvent {
    pub sample: MetricSample,
    pub entry: LogEntry,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub events_flushed: usize,
    pub batches_sent: usize,
    pub metrics_failed: usize,
    pub logs_failed: usize,
    pub dropped_events: u64,
}

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("flush timed out after {waited:?} with {pending} events pending")]
    Timeout { waited: Duration, pending: usize },
}

/// Batches telemetry events and pushes them in the background.
///
/// Must be created inside a tokio runtime; the flush loop is spawned on it.
#[derive(Clone)]
pub struct TelemetryExporter {
    config: ExporterConfig,
    sink: Arc<dyn TelemetrySink>,
    queue: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    notify: Arc<Notify>,
    dropped_events: Arc<AtomicU64>,
    // Held from draining a batch until it has been sent.
    sending: Arc<Mutex<()>>,
}

impl TelemetryExporter {
    pub fn new(sink: Arc<dyn TelemetrySink>, config: ExporterConfig) -> Self {
        let exporter = Self {
            config,
            sink,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            dropped_events: Arc::new(AtomicU64::new(0)),
            sending: Arc::new(Mutex::new(())),
        };
        exporter.spawn_flush_loop();
        exporter
    }

    pub async fn enqueue(&self, event: TelemetryEvent) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.config.queue_capacity {
            queue.pop_front();
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                capacity = self.config.queue_capacity,
                "telemetry queue full; dropped oldest event"
            );
        }
        queue.push_back(event);
        if queue.len() >= self.config.max_batch_size {
            self.notify.notify_one();
        }
    }

    /// Sends queued events until the queue is empty or `timeout` elapses.
    /// Batches already being sent by the background loop are waited for.
    /// Sink failures are counted, not returned.
    pub async fn flush(&self, timeout: Duration) -> Result<FlushStats, FlushError> {
        let start = Instant::now();
        let mut stats = FlushStats::default();
        loop {
            let Some(remaining) = timeout.checked_sub(start.elapsed()) else {
                return Err(self.timed_out(start).await);
            };
            let Ok(_sending) = tokio::time::timeout(remaining, self.sending.lock()).await else {
                return Err(self.timed_out(start).await);
            };

            let batch = self.drain_batch().await;
            if batch.is_empty() {
                stats.dropped_events = self.dropped_events();
                return Ok(stats);
            }

            let (metrics_ok, logs_ok) = self.send_batch(&batch).await;
            stats.events_flushed += batch.len();
            stats.batches_sent += 1;
            if !metrics_ok {
                stats.metrics_failed += batch.len();
            }
            if !logs_ok {
                stats.logs_failed += batch.len();
            }
        }
    }

    async fn timed_out(&self, start: Instant) -> FlushError {
        FlushError::Timeout {
            waited: start.elapsed(),
            pending: self.queue.lock().await.len(),
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub async fn pending_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    fn spawn_flush_loop(&self) {
        let exporter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(exporter.config.flush_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let _ = exporter.flush(exporter.config.flush_interval).await;
                    }
                    _ = exporter.notify.notified() => {
                        let _ = exporter.flush(exporter.config.flush_interval).await;
                    }
                }
            }
        });
    }

    async fn drain_batch(&self) -> Vec<TelemetryEvent> {
        let mut queue = self.queue.lock().await;
        let take = queue.len().min(self.config.max_batch_size.max(1));
        queue.drain(..take).collect()
    }

    async fn send_batch(&self, batch: &[TelemetryEvent]) -> (bool, bool) {
        let samples: Vec<MetricSample> = batch.iter().map(|event| event.sample.clone()).collect();
        let entries: Vec<LogEntry> = batch.iter().map(|event| event.entry.clone()).collect();
        let (metrics, logs) = tokio::join!(
            self.sink.push_metrics(&samples),
            self.sink.push_logs(&entries)
        );
        if let Err(err) = &metrics {
            tracing::warn!(error = %err, events = batch.len(), "error sending metrics batch");
        }
        if let Err(err) = &logs {
            tracing::warn!(error = %err, events = batch.len(), "error sending logs batch");
        }
        (metrics.is_ok(), logs.is_ok())
    }
}
