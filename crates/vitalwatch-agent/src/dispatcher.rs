//! Ships completed capture windows to the analysis service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use vitalwatch_core::{DetectionEvent, MotionAnalysisRequest, WearGate};

use crate::transport::CollectorClient;

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Confirmed,
    NotConfirmed,
    /// Device came off the wrist between capture and dispatch.
    SkippedUnworn,
    Failed(String),
}

#[derive(Debug, Default)]
struct DispatchStats {
    confirmed: AtomicU64,
    not_confirmed: AtomicU64,
    skipped_unworn: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub confirmed: u64,
    pub not_confirmed: u64,
    pub skipped_unworn: u64,
    pub failed: u64,
}

pub struct EventDispatcher<C> {
    collector: Arc<C>,
    wear: Arc<WearGate>,
    patient_id: String,
    stats: DispatchStats,
}

impl<C: CollectorClient> EventDispatcher<C> {
    pub fn new(collector: Arc<C>, wear: Arc<WearGate>, patient_id: impl Into<String>) -> Self {
        Self {
            collector,
            wear,
            patient_id: patient_id.into(),
            stats: DispatchStats::default(),
        }
    }

    /// Submit one window for confirmation. Failures are logged and counted,
    /// never retried.
    ///
    /// The wear check here is not atomic with the capture; an event that
    /// races with removal may still go out. Removal before this point drops
    /// it.
    pub async fn dispatch(&self, event: DetectionEvent) -> DispatchOutcome {
        if !self.wear.is_worn() {
            log::info!("event #{} dropped: device not worn", event.sequence);
            self.stats.skipped_unworn.fetch_add(1, Ordering::Relaxed);
            return DispatchOutcome::SkippedUnworn;
        }

        let request = MotionAnalysisRequest::new(&event.window, &self.patient_id);
        log::info!(
            "submitting event #{} ({} samples, peak {:.1}) for analysis",
            event.sequence,
            request.motion_data.len(),
            event.peak_magnitude
        );

        match self.collector.analyze_motion(&request).await {
            Ok(resp) if resp.fall_detected => {
                log::warn!("fall confirmed for event #{} ({})", event.sequence, event.id);
                self.stats.confirmed.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Confirmed
            }
            Ok(_) => {
                log::info!("event #{} not confirmed as a fall", event.sequence);
                self.stats.not_confirmed.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::NotConfirmed
            }
            Err(e) => {
                log::warn!("analysis request for event #{} failed: {e}", event.sequence);
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Drain `events`, one task per event. Returns after the queue closes and
    /// every in-flight dispatch has finished.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<DetectionEvent>) {
        let mut inflight = JoinSet::new();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let this = Arc::clone(&self);
                        inflight.spawn(async move { this.dispatch(event).await });
                    }
                    None => break,
                },
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    log_join(joined);
                }
            }
        }
        while let Some(joined) = inflight.join_next().await {
            log_join(joined);
        }
        log::debug!("event dispatcher stopped");
    }

    pub fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            confirmed: self.stats.confirmed.load(Ordering::Relaxed),
            not_confirmed: self.stats.not_confirmed.load(Ordering::Relaxed),
            skipped_unworn: self.stats.skipped_unworn.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

fn log_join(joined: Result<DispatchOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => log::debug!("dispatch finished: {outcome:?}"),
        Err(e) if e.is_panic() => log::error!("dispatch task panicked: {e}"),
        Err(_) => {}
    }
}
