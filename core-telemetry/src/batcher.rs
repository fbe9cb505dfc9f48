//! # Telemetry Batcher
//!
//! Accumulates performance, behavior and error events into batches and
//! delivers them best-effort.
//!
//! - A batch is sent when `batch_size` events are pending, on the flush
//!   timer, and on lifecycle teardown
//! - A failed send is queued for retry, never surfaced to the caller
//! - Teardown uses the host's beacon transport so the last batch can leave
//!   while the host unloads

use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::events::{BehaviorEvent, ErrorEvent, PerformanceMetric, TelemetryEvent, TelemetryPayload};
use crate::retry_queue::RetryQueue;
use crate::session::AnalyticsSession;
use bridge_traits::{
    BeaconTransport, Clock, HttpClient, HttpMethod, HttpRequest, LifecycleObserver, LifecycleState,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::events::CoreEvent;
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Host capabilities the batcher delivers through.
#[derive(Clone)]
pub struct TelemetryHost {
    pub http_client: Arc<dyn HttpClient>,
    pub clock: Arc<dyn Clock>,
    pub beacon: Option<Arc<dyn BeaconTransport>>,
    pub lifecycle: Option<Arc<dyn LifecycleObserver>>,
}

impl TelemetryHost {
    pub fn new(http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http_client,
            clock,
            beacon: None,
            lifecycle: None,
        }
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }
}

/// What a flush did with the pending events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Nothing was pending.
    Empty,
    /// The batch was accepted by the collector (or the beacon transport).
    Sent { events: usize },
    /// Delivery failed; the batch is in the retry queue.
    Queued { events: usize },
    /// The batch could not be serialized and was discarded.
    Discarded { events: usize },
}

/// Result of one pass over the retry queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub dropped: usize,
}

/// Polled snapshot for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub session: AnalyticsSession,
    pub pending_event_count: usize,
    pub retry_queue_size: usize,
    /// Events discarded because the pending buffer was full.
    pub dropped_events: u64,
    /// Batches discarded after reaching the retry cap.
    pub dropped_batches: u64,
}

#[derive(Serialize)]
struct Batch<'a> {
    session: &'a AnalyticsSession,
    events: &'a [TelemetryEvent],
    sent_at: DateTime<Utc>,
}

struct Inner {
    config: TelemetryConfig,
    host: TelemetryHost,
    session: Mutex<AnalyticsSession>,
    pending: Mutex<VecDeque<TelemetryEvent>>,
    retry: Mutex<RetryQueue>,
    dropped_events: AtomicU64,
    started: AtomicBool,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Batches telemetry for one analytics session.
///
/// Cloning is cheap; clones feed the same session.
#[derive(Clone)]
pub struct TelemetryBatcher {
    inner: Arc<Inner>,
}

impl TelemetryBatcher {
    pub fn new(config: TelemetryConfig, host: TelemetryHost) -> Self {
        let session = AnalyticsSession::new(config.user_agent.clone(), host.clock.now());
        let retry = RetryQueue::new(config.max_retries, config.retry_delay);

        info!(
            session_id = %session.session_id,
            endpoint = %redact_url(&config.endpoint),
            "Telemetry session started"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                host,
                session: Mutex::new(session),
                pending: Mutex::new(VecDeque::new()),
                retry: Mutex::new(retry),
                dropped_events: AtomicU64::new(0),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Intake
    // ------------------------------------------------------------------

    pub async fn track_performance(&self, metric: PerformanceMetric) {
        self.track(TelemetryPayload::Performance(metric)).await;
    }

    pub async fn track_user_behavior(&self, event: BehaviorEvent) {
        self.track(TelemetryPayload::Behavior(event)).await;
    }

    pub async fn track_error(&self, error: ErrorEvent) {
        self.track(TelemetryPayload::Error(error)).await;
    }

    /// Append a payload; flushes once `batch_size` events are pending.
    pub async fn track(&self, payload: TelemetryPayload) {
        if self.append(payload) {
            self.flush().await;
        }
    }

    /// Record an engine event from a synchronous context.
    ///
    /// A full batch is flushed on a spawned task when a runtime is
    /// available, otherwise by the next timer tick.
    pub fn ingest(&self, event: &CoreEvent) {
        let Some(payload) = TelemetryPayload::from_core_event(event) else {
            return;
        };

        if self.append(payload) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let batcher = self.clone();
                handle.spawn(async move {
                    batcher.flush().await;
                });
            }
        }
    }

    /// Record the host's connection type on the session.
    pub fn set_network_type(&self, network_type: Option<String>) {
        self.inner.session.lock().network_type = network_type;
    }

    /// Returns `true` when a batch is ready to flush.
    fn append(&self, payload: TelemetryPayload) -> bool {
        let now = self.inner.host.clock.now();
        let session_id = {
            let mut session = self.inner.session.lock();
            session.record(&payload, now);
            session.session_id
        };

        let mut pending = self.inner.pending.lock();
        pending.push_back(TelemetryEvent::new(session_id, now, payload));

        let mut dropped = 0;
        while pending.len() > self.inner.config.max_pending_events {
            pending.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            self.inner
                .dropped_events
                .fetch_add(dropped, Ordering::Relaxed);
            warn!(dropped, "Telemetry buffer full; oldest events dropped");
        }

        pending.len() >= self.inner.config.batch_size
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    /// Send every pending event as one batch.
    ///
    /// Never fails: a batch that cannot be delivered is queued for retry.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> FlushOutcome {
        let events = self.take_pending();
        if events.is_empty() {
            return FlushOutcome::Empty;
        }
        let count = events.len();

        let body = match self.serialize(&events) {
            Ok(body) => body,
            Err(e) => {
                warn!(events = count, error = %e, "Telemetry batch discarded");
                return FlushOutcome::Discarded { events: count };
            }
        };

        match self.send(body.clone()).await {
            Ok(()) => {
                debug!(events = count, "Telemetry batch sent");
                FlushOutcome::Sent { events: count }
            }
            Err(e) => {
                warn!(events = count, error = %e, "Telemetry send failed; queued for retry");
                let now = self.inner.host.clock.now();
                self.inner.retry.lock().push(body, count, now);
                FlushOutcome::Queued { events: count }
            }
        }
    }

    /// Flush through the beacon transport.
    ///
    /// Used while the host unloads: the beacon can complete after this
    /// process is gone. A refused beacon (or no beacon transport) queues the
    /// batch for retry.
    pub fn flush_on_teardown(&self) -> FlushOutcome {
        let events = self.take_pending();
        if events.is_empty() {
            return FlushOutcome::Empty;
        }
        let count = events.len();

        let body = match self.serialize(&events) {
            Ok(body) => body,
            Err(e) => {
                warn!(events = count, error = %e, "Telemetry batch discarded");
                return FlushOutcome::Discarded { events: count };
            }
        };

        let accepted = self
            .inner
            .host
            .beacon
            .as_ref()
            .is_some_and(|beacon| beacon.send_beacon(&self.inner.config.endpoint, body.clone()));

        if accepted {
            info!(events = count, "Telemetry beacon sent");
            FlushOutcome::Sent { events: count }
        } else {
            warn!(events = count, error = %TelemetryError::BeaconRefused, "Teardown flush queued for retry");
            let now = self.inner.host.clock.now();
            self.inner.retry.lock().push(body, count, now);
            FlushOutcome::Queued { events: count }
        }
    }

    /// Resend queued batches that are due.
    ///
    /// A batch whose failed resends reach `max_retries` is dropped.
    #[instrument(skip(self))]
    pub async fn process_retry_queue(&self) -> RetryReport {
        let due = self.inner.retry.lock().due(self.inner.host.clock.now());
        let mut report = RetryReport {
            attempted: due.len(),
            ..RetryReport::default()
        };

        for entry in due {
            match self.send(entry.payload.clone()).await {
                Ok(()) => {
                    self.inner.retry.lock().remove(entry.id);
                    report.delivered += 1;
                    debug!(entry_id = %entry.id, events = entry.event_count, "Queued batch delivered");
                }
                Err(e) => {
                    let now = self.inner.host.clock.now();
                    if self.inner.retry.lock().record_failure(entry.id, now) {
                        report.dropped += 1;
                        warn!(
                            entry_id = %entry.id,
                            events = entry.event_count,
                            error = %e,
                            "Queued batch dropped after max retries"
                        );
                    } else {
                        debug!(entry_id = %entry.id, error = %e, "Queued batch resend failed");
                    }
                }
            }
        }

        report
    }

    fn take_pending(&self) -> Vec<TelemetryEvent> {
        self.inner.pending.lock().drain(..).collect()
    }

    fn serialize(&self, events: &[TelemetryEvent]) -> Result<Bytes> {
        let session = self.inner.session.lock().clone();
        let batch = Batch {
            session: &session,
            events,
            sent_at: self.inner.host.clock.now(),
        };
        Ok(Bytes::from(serde_json::to_vec(&batch)?))
    }

    async fn send(&self, body: Bytes) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, &self.inner.config.endpoint)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.inner.config.user_agent)
            .timeout(Duration::from_secs(10))
            .body(body);

        let response = self.inner.host.http_client.execute(request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(TelemetryError::Rejected {
                status: response.status,
            })
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawn the flush timer, the retry timer and, if configured, the
    /// lifecycle watcher. Calling it again is a no-op.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.inner.tasks.lock();

        let flush_every = self.inner.config.flush_interval;
        tasks.push(self.spawn_ticker(flush_every, |batcher| async move {
            batcher.flush().await;
        }));

        let retry_every = self.inner.config.retry_check_interval;
        tasks.push(self.spawn_ticker(retry_every, |batcher| async move {
            batcher.process_retry_queue().await;
        }));

        if let Some(lifecycle) = self.inner.host.lifecycle.clone() {
            let batcher = self.clone();
            tasks.push(tokio::spawn(async move {
                batcher.watch_lifecycle(lifecycle).await;
            }));
        }

        debug!(
            flush_interval_ms = flush_every.as_millis() as u64,
            retry_check_interval_ms = retry_every.as_millis() as u64,
            "Telemetry timers started"
        );
    }

    fn spawn_ticker<F, Fut>(&self, period: Duration, mut on_tick: F) -> JoinHandle<()>
    where
        F: FnMut(TelemetryBatcher) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let batcher = self.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => on_tick(batcher.clone()).await,
                }
            }
        })
    }

    async fn watch_lifecycle(&self, lifecycle: Arc<dyn LifecycleObserver>) {
        let mut changes = match lifecycle.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Lifecycle subscription failed; teardown flush disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                state = changes.next() => match state {
                    Some(LifecycleState::Hidden) => {
                        debug!("Host hidden; flushing telemetry");
                        self.flush().await;
                    }
                    Some(LifecycleState::Unloading) => {
                        debug!("Host unloading; sending telemetry beacon");
                        self.flush_on_teardown();
                    }
                    Some(LifecycleState::Visible) => {}
                    None => break,
                },
            }
        }
    }

    /// Stop the timers, close the session and send what is left through the
    /// teardown path.
    pub async fn shutdown(&self) -> FlushOutcome {
        self.inner.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        let now = self.inner.host.clock.now();
        self.inner.session.lock().end(now);

        let outcome = self.flush_on_teardown();
        info!(?outcome, "Telemetry shut down");
        outcome
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn session(&self) -> AnalyticsSession {
        self.inner.session.lock().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn retry_queue_len(&self) -> usize {
        self.inner.retry.lock().len()
    }

    /// Attempt counters of the queued batches, oldest first.
    pub fn retry_attempts(&self) -> Vec<u32> {
        self.inner
            .retry
            .lock()
            .entries()
            .map(|entry| entry.attempts)
            .collect()
    }

    pub fn summary(&self) -> AnalyticsSummary {
        let retry = self.inner.retry.lock();
        AnalyticsSummary {
            session: self.inner.session.lock().clone(),
            pending_event_count: self.inner.pending.lock().len(),
            retry_queue_size: retry.len(),
            dropped_events: self.inner.dropped_events.load(Ordering::Relaxed),
            dropped_batches: retry.dropped(),
        }
    }
}

impl std::fmt::Debug for TelemetryBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBatcher")
            .field("endpoint", &redact_url(&self.inner.config.endpoint))
            .field("pending", &self.pending_count())
            .field("retry_queue", &self.retry_queue_len())
            .finish()
    }
}
